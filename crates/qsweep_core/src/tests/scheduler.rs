use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::*;
use crate::config::SweepSelector;
use crate::sink::SeriesSink;
use crate::sweep::SweepState;

fn params(min: u32, max: u32, batch: usize) -> SweepParams {
    SweepParams::new(SweepSelector::ProcessorSet, min, max, 1.0, batch)
}

#[test]
fn test_single_short_batch_emits_in_order() {
    let scheduler = SweepScheduler::new(ScriptedFactory::instant(), base());
    let run = launch(&scheduler, params(10, 12, 5)).unwrap();

    assert_eq!(run.outcomes.recv().unwrap(), SweepOutcome::Completed);
    assert_eq!(run.handle.progress().flushes(), 1);
    assert_eq!(run.handle.join(), SweepState::Completed);

    for channel in MetricChannel::ALL {
        assert_eq!(xs(&run.points, channel), vec![10.0, 11.0, 12.0]);
    }

    let rejects: Vec<f64> = run
        .points
        .lock()
        .unwrap()
        .iter()
        .filter(|(c, _, _)| *c == MetricChannel::RejectProbability)
        .map(|(_, _, y)| *y)
        .collect();
    assert_eq!(rejects, vec![0.10, 0.11, 0.12]);
}

#[test]
fn test_points_interleave_channels_per_run() {
    let scheduler = SweepScheduler::new(ScriptedFactory::instant(), base());
    let run = launch(&scheduler, params(1, 2, 2)).unwrap();
    run.handle.join();

    let channels: Vec<MetricChannel> = run.points.lock().unwrap().iter().map(|p| p.0).collect();
    let mut expected = MetricChannel::ALL.to_vec();
    expected.extend(MetricChannel::ALL);
    assert_eq!(channels, expected);
}

#[test]
fn test_flush_count_is_ceil_of_steps_over_batch() {
    let scheduler = SweepScheduler::new(ScriptedFactory::instant(), base());
    let run = launch(&scheduler, params(1, 7, 3)).unwrap();

    assert_eq!(run.handle.join(), SweepState::Completed);
    assert_eq!(run.outcomes.recv().unwrap(), SweepOutcome::Completed);

    let expected: Vec<f64> = (1..=7).map(f64::from).collect();
    assert_eq!(xs(&run.points, MetricChannel::LifeTime), expected);
}

#[test]
fn test_flush_counter() {
    for (min, max, batch, flushes) in [(1, 7, 3, 3), (1, 6, 3, 2), (5, 5, 4, 1), (1, 10, 1, 10)] {
        let scheduler = SweepScheduler::new(ScriptedFactory::instant(), base());
        let run = launch(&scheduler, params(min, max, batch)).unwrap();
        run.outcomes.recv().unwrap();

        assert_eq!(run.handle.progress().flushes(), flushes);
        assert_eq!(run.handle.progress().completed(), (max - min + 1) as usize);
        assert_eq!(run.handle.progress().fraction(), 1.0);
    }
}

#[test]
fn test_only_final_batch_is_short() {
    for (min, max, batch, sizes) in [
        (1, 7, 3, vec![3, 3, 1]),
        (1, 6, 3, vec![3, 3]),
        (10, 12, 5, vec![3]),
        (1, 4, 1, vec![1, 1, 1, 1]),
    ] {
        let factory = ScriptedFactory::instant();
        let trace = factory.trace();
        let scheduler = SweepScheduler::new(factory, base());
        let run = launch(&scheduler, params(min, max, batch)).unwrap();

        assert_eq!(run.handle.join(), SweepState::Completed);
        assert_eq!(batch_sizes(&trace), sizes, "steps {min}..={max}, batch {batch}");
    }
}

#[test]
fn test_handle_starts_running() {
    let scheduler = SweepScheduler::new(ScriptedFactory::new(|_| Script::WaitForStop), base());
    let run = launch(&scheduler, params(1, 2, 2)).unwrap();

    assert_eq!(run.handle.state(), SweepState::Running);
    run.handle.stop();
    assert_eq!(run.handle.join(), SweepState::Cancelled);
}

#[test]
fn test_emission_order_ignores_completion_order() {
    let factory = ScriptedFactory::new(|step| {
        let millis = match step {
            1 => 150,
            2 => 100,
            3 => 0,
            _ => 50,
        };
        Script::Finish(Duration::from_millis(millis))
    });
    let finished = factory.finished();
    let scheduler = SweepScheduler::new(factory, base());
    let run = launch(&scheduler, params(1, 4, 4)).unwrap();

    assert_eq!(run.handle.join(), SweepState::Completed);
    assert_eq!(finished.lock().unwrap().first(), Some(&3));
    for channel in MetricChannel::ALL {
        assert_eq!(xs(&run.points, channel), vec![1.0, 2.0, 3.0, 4.0]);
    }
}

#[test]
fn test_stop_during_flush_prevents_next_flush() {
    let factory = ScriptedFactory::new(|_| Script::WaitForStop);
    let started = factory.started();
    let scheduler = SweepScheduler::new(factory, base());
    let run = launch(&scheduler, params(1, 9, 3)).unwrap();

    assert!(wait_until(|| started.load(Ordering::SeqCst) == 3));
    run.handle.stop();

    assert_eq!(run.outcomes.recv().unwrap(), SweepOutcome::Cancelled);
    assert_eq!(run.handle.state(), SweepState::Cancelled);
    assert_eq!(run.handle.progress().flushes(), 1);

    // A second stop changes nothing
    run.handle.stop();
    assert_eq!(run.handle.join(), SweepState::Cancelled);
    assert!(run.outcomes.try_recv().is_err());
    assert_eq!(started.load(Ordering::SeqCst), 3);
    assert!(run.points.lock().unwrap().is_empty());
}

#[test]
fn test_joined_results_survive_stop() {
    let factory = ScriptedFactory::new(|step| match step {
        1 => Script::Finish(Duration::ZERO),
        _ => Script::WaitForStop,
    });
    let scheduler = SweepScheduler::new(factory, base());
    let run = launch(&scheduler, params(1, 4, 4)).unwrap();

    let points = run.points.clone();
    assert!(wait_until(|| points.lock().unwrap().len() == 3));
    run.handle.stop();

    assert_eq!(run.handle.join(), SweepState::Cancelled);
    assert_eq!(run.outcomes.recv().unwrap(), SweepOutcome::Cancelled);
    assert_eq!(xs(&run.points, MetricChannel::RejectProbability), vec![1.0]);
    assert_eq!(run.points.lock().unwrap().len(), 3);
}

#[test]
fn test_stop_after_completion_is_noop() {
    let scheduler = SweepScheduler::new(ScriptedFactory::instant(), base());
    let run = launch(&scheduler, params(1, 3, 2)).unwrap();

    assert_eq!(run.outcomes.recv().unwrap(), SweepOutcome::Completed);
    let before = run.points.lock().unwrap().len();

    run.handle.stop();
    run.handle.stop();

    assert_eq!(run.handle.join(), SweepState::Completed);
    assert_eq!(run.points.lock().unwrap().len(), before);
    assert!(run.outcomes.try_recv().is_err());
}

#[test]
fn test_failed_runs_are_skipped() {
    let factory = ScriptedFactory::new(|step| match step {
        2 => Script::Fail,
        3 => Script::Panic,
        _ => Script::Finish(Duration::ZERO),
    });
    let scheduler = SweepScheduler::new(factory, base());
    let run = launch(&scheduler, params(1, 5, 5)).unwrap();

    assert_eq!(run.handle.join(), SweepState::Completed);
    assert_eq!(run.outcomes.recv().unwrap(), SweepOutcome::Completed);
    for channel in MetricChannel::ALL {
        assert_eq!(xs(&run.points, channel), vec![1.0, 4.0, 5.0]);
    }
}

#[test]
fn test_build_failure_is_skipped() {
    let factory = |config: &StepConfiguration| {
        if config.step == 2 {
            return Err(RunError::Engine("bad step".to_string()));
        }
        Ok(ScriptedEngine::finishing(config.step))
    };
    let scheduler = SweepScheduler::new(factory, base());
    let run = launch(&scheduler, params(1, 3, 2)).unwrap();

    assert_eq!(run.handle.join(), SweepState::Completed);
    assert_eq!(xs(&run.points, MetricChannel::LifeTime), vec![1.0, 3.0]);
}

#[test]
fn test_processor_sweep_passes_step_configuration() {
    let factory = |config: &StepConfiguration| {
        assert_eq!(config.processor_rates, vec![1.0; config.step as usize]);
        assert_eq!(config.source_rates, base().source_rates);
        Ok(ScriptedEngine::finishing(config.step))
    };
    let scheduler = SweepScheduler::new(factory, base());
    let run = launch(&scheduler, params(1, 4, 3)).unwrap();

    assert_eq!(run.handle.join(), SweepState::Completed);
    assert_eq!(xs(&run.points, MetricChannel::LifeTime).len(), 4);
}

#[test]
fn test_invalid_params_never_start() {
    let factory = ScriptedFactory::instant();
    let started = factory.started();
    let scheduler = SweepScheduler::new(factory, base());

    let Err((err, outcomes)) = launch(&scheduler, params(5, 4, 2)) else {
        panic!("reversed range must be rejected");
    };
    assert!(matches!(err, SweepError::Input(_)));
    assert_eq!(outcomes.recv().unwrap(), SweepOutcome::Failed);
    assert!(outcomes.try_recv().is_err());
    assert_eq!(started.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_base_config_never_starts() {
    let mut config = base();
    config.source_rates.clear();
    let scheduler = SweepScheduler::new(ScriptedFactory::instant(), config);

    let Err((err, outcomes)) = launch(&scheduler, params(1, 3, 2)) else {
        panic!("config without sources must be rejected");
    };
    assert!(matches!(err, SweepError::Config(_)));
    assert_eq!(outcomes.recv().unwrap(), SweepOutcome::Failed);
}

#[test]
fn test_relaunch_into_sink_leaves_no_residue() {
    let scheduler = SweepScheduler::new(ScriptedFactory::instant(), base());
    let sink = Arc::new(SeriesSink::new());
    let params = params(2, 4, 2);

    for _ in 0..2 {
        let handle = scheduler.launch_into(params, sink.clone(), |_| {}).unwrap();
        assert_eq!(handle.join(), SweepState::Completed);

        assert_eq!(sink.name(), "Processor[2:4], lambda=1.0");
        for channel in MetricChannel::ALL {
            let xs: Vec<f64> = sink.snapshot(channel).iter().map(|p| p.x).collect();
            assert_eq!(xs, vec![2.0, 3.0, 4.0]);
        }
    }
}

#[test]
fn test_stopper_cancels_from_another_thread() {
    let factory = ScriptedFactory::new(|_| Script::WaitForStop);
    let started = factory.started();
    let scheduler = SweepScheduler::new(factory, base());
    let run = launch(&scheduler, params(1, 4, 2)).unwrap();

    let stopper = run.handle.stopper();
    assert!(wait_until(|| started.load(Ordering::SeqCst) == 2));
    std::thread::spawn(move || stopper.stop()).join().unwrap();

    assert_eq!(run.handle.join(), SweepState::Cancelled);
    assert_eq!(run.outcomes.recv().unwrap(), SweepOutcome::Cancelled);
    assert_eq!(started.load(Ordering::SeqCst), 2);
}

#[test]
fn test_rejected_relaunch_keeps_previous_series() {
    let scheduler = SweepScheduler::new(ScriptedFactory::instant(), base());
    let sink = Arc::new(SeriesSink::new());

    let handle = scheduler.launch_into(params(1, 3, 2), sink.clone(), |_| {}).unwrap();
    assert_eq!(handle.join(), SweepState::Completed);

    let (tx, outcomes) = std::sync::mpsc::channel();
    let result = scheduler.launch_into(params(5, 4, 2), sink.clone(), move |outcome| {
        tx.send(outcome).unwrap()
    });

    assert!(matches!(result, Err(SweepError::Input(_))));
    assert_eq!(outcomes.recv().unwrap(), SweepOutcome::Failed);
    assert_eq!(sink.name(), "Processor[1:3], lambda=1.0");
    for channel in MetricChannel::ALL {
        assert_eq!(sink.len(channel), 3);
    }
}
