//! Rendering of streamed points and finished series.

use std::io::{self, Write};

use clap::ValueEnum;
use qsweep_core::{MetricChannel, SeriesPoint, SeriesSink};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Csv,
    Json,
}

#[derive(Serialize)]
struct SeriesJson<'a> {
    name: &'a str,
    channels: Vec<ChannelJson>,
}

#[derive(Serialize)]
struct ChannelJson {
    channel: MetricChannel,
    label: &'static str,
    unit: &'static str,
    points: Vec<SeriesPoint>,
}

/// One line per emitted point, as the sweep streams them
pub fn write_point(
    out: &mut impl Write,
    channel: MetricChannel,
    x: f64,
    y: f64,
) -> io::Result<()> {
    writeln!(out, "{:<20} x={:<6} y={:.6}", channel.label(), x, y)
}

/// Write every channel of `sink` in the requested format.
pub fn write_series(out: &mut impl Write, sink: &SeriesSink, format: Format) -> io::Result<()> {
    let name = sink.name();
    let series = sink.snapshot_all();

    match format {
        Format::Table => write_table(out, &name, &series),
        Format::Csv => write_csv(out, &series),
        Format::Json => {
            let doc = SeriesJson {
                name: &name,
                channels: series
                    .into_iter()
                    .map(|(channel, points)| ChannelJson {
                        channel,
                        label: channel.label(),
                        unit: channel.unit(),
                        points,
                    })
                    .collect(),
            };
            serde_json::to_writer_pretty(&mut *out, &doc)?;
            writeln!(out)
        }
    }
}

/// Channels share their x-values, so rows are keyed off the first channel
fn rows(series: &[(MetricChannel, Vec<SeriesPoint>)]) -> Vec<(f64, Vec<Option<f64>>)> {
    let Some((_, first)) = series.first() else {
        return Vec::new();
    };
    first
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let ys = series
                .iter()
                .map(|(_, points)| points.get(i).filter(|p| p.x == point.x).map(|p| p.y))
                .collect();
            (point.x, ys)
        })
        .collect()
}

fn write_table(
    out: &mut impl Write,
    name: &str,
    series: &[(MetricChannel, Vec<SeriesPoint>)],
) -> io::Result<()> {
    writeln!(out, "{name}")?;
    write!(out, "{:>8}", "x")?;
    for (channel, _) in series {
        write!(out, " {:>20}", channel.label())?;
    }
    writeln!(out)?;

    for (x, ys) in rows(series) {
        write!(out, "{:>8}", x)?;
        for y in ys {
            match y {
                Some(y) => write!(out, " {:>20.6}", y)?,
                None => write!(out, " {:>20}", "-")?,
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_csv(out: &mut impl Write, series: &[(MetricChannel, Vec<SeriesPoint>)]) -> io::Result<()> {
    write!(out, "x")?;
    for (channel, _) in series {
        write!(out, ",{}", channel.label())?;
    }
    writeln!(out)?;

    for (x, ys) in rows(series) {
        write!(out, "{x}")?;
        for y in ys {
            match y {
                Some(y) => write!(out, ",{y}")?,
                None => write!(out, ",")?,
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
