use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::Journal;
use crate::source::JsonFileSource;
use crate::timeline::{reorder_with_pinned, EntryId, TimelineEntry};

#[derive(Args, Debug, Clone)]
pub struct TimelineArgs {
    /// Journal export (JSON) to read check-ins from
    pub export: PathBuf,
    /// Select the check-in with this id before printing
    #[arg(long)]
    pub select: Option<String>,
    /// List this check-in first, keeping the others in timeline order
    #[arg(long)]
    pub pin: Option<String>,
    /// Fetch images for the selection and its neighbours
    #[arg(long)]
    pub load_images: bool,
    /// Seconds to wait for image fetches before printing
    #[arg(long, default_value_t = 15)]
    pub wait_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct InboxArgs {
    /// Journal export (JSON) to read notifications from
    pub export: PathBuf,
    /// Open one notification and print where it leads
    #[arg(long)]
    pub open: Option<String>,
    /// Mark every notification read
    #[arg(long)]
    pub all_read: bool,
}

pub fn show_timeline(journal: &mut Journal, args: TimelineArgs) -> Result<()> {
    let source = JsonFileSource::new(&args.export);
    journal.refresh(&source)?;

    if let Some(id) = &args.select {
        let entry = journal
            .select_id(&EntryId::new(id.as_str()))
            .with_context(|| format!("selecting check-in {id}"))?;
        tracing::debug!(entry = %entry.id(), "selected from command line");
    }
    if args.load_images {
        journal.settle_images(Duration::from_secs(args.wait_secs));
    }

    let pinned = args.pin.map(EntryId::new);
    println!("{}", render_timeline(journal, pinned.as_ref()));
    if let Some(target) = journal.grid().navigation_target() {
        println!("\n-> {}", target.describe());
    }
    Ok(())
}

pub fn show_inbox(journal: &mut Journal, args: InboxArgs) -> Result<()> {
    let source = JsonFileSource::new(&args.export);
    journal.refresh(&source)?;

    if args.all_read {
        let flipped = journal.inbox_mut().mark_all_read();
        tracing::info!(flipped, "marked inbox read");
    }
    let opened = match &args.open {
        Some(id) => Some(
            journal
                .open_notification(id)
                .with_context(|| format!("opening notification {id}"))?,
        ),
        None => None,
    };

    println!("{}", render_inbox(journal));
    println!("\n{} unread", journal.inbox().unread_count());
    if let Some(target) = opened {
        println!("-> {}", target.describe());
    }
    Ok(())
}

/// One line per check-in: selection marker, day label, date, id, image state, title.
pub fn render_timeline(journal: &Journal, pinned: Option<&EntryId>) -> String {
    let grid = journal.grid();
    let labels = grid.day_labels();
    let labelled: Vec<(&TimelineEntry, &str)> = grid
        .entries()
        .iter()
        .zip(labels.iter().map(String::as_str))
        .collect();
    let ordered = reorder_with_pinned(&labelled, pinned, |(entry, _)| entry.id());
    let selected = grid.selected_id();

    let mut out = String::new();
    for (entry, label) in ordered {
        let marker = if Some(entry.id()) == selected { '*' } else { '-' };
        let _ = writeln!(
            out,
            "{marker} {label} | {} | {} | {} | {}",
            entry.occurs_on(),
            entry.id(),
            journal.images().state(entry.id()).label(),
            entry.title(),
        );
    }
    out.trim_end().to_string()
}

pub fn render_inbox(journal: &Journal) -> String {
    let mut out = String::new();
    for item in journal.inbox().iter() {
        let marker = if item.is_read { '-' } else { '*' };
        let _ = writeln!(
            out,
            "{marker} {} | {} | {}",
            item.id,
            item.title,
            crate::notifications::resolve(item).describe(),
        );
    }
    out.trim_end().to_string()
}
