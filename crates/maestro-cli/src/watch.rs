use anyhow::{Context, Result};
use maestro_core::SystemClock;
use maestro_runtime::{MaestroConfig, Runtime, TimelineFrame};
use maestro_timeline::NodeData;
use std::io::{self, Write};
use std::sync::Arc;

use crate::session::open_database;

pub(crate) async fn run(config: &MaestroConfig, ticks: u64) -> Result<()> {
    let snapshots = open_database(&config.db_path())?;
    let runtime = Runtime::boot(config, snapshots, Arc::new(SystemClock))
        .await
        .context("Failed to start workspace runtime")?;
    let mut frames = runtime.handle().frames();
    let mut last_tick = frames.borrow().ticks;
    let mut printed = 0;

    while printed < ticks {
        frames
            .changed()
            .await
            .context("Workspace runtime stopped unexpectedly")?;
        let frame = frames.borrow_and_update().clone();
        if frame.ticks == last_tick {
            continue;
        }
        last_tick = frame.ticks;
        printed += 1;
        let stdout = io::stdout();
        print_frame(&frame, &mut stdout.lock())?;
    }

    runtime
        .shutdown()
        .await
        .context("Failed to stop workspace runtime")?;
    Ok(())
}

fn print_frame(frame: &TimelineFrame, out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "tick {} at {} ({})",
        frame.ticks,
        frame.now.to_rfc3339(),
        frame.zoom_level
    )?;
    for node in frame.live_nodes() {
        if let NodeData::Segment { title, status, .. } = &node.data {
            writeln!(
                out,
                "  {:<32} {:<14} {:>9.1}px",
                title,
                status.as_str(),
                node.width
            )?;
        }
    }
    out.flush()
}
