//! Plain-text output for the `audioshelf` commands.

use anyhow::Result;
use audioshelf_core::{
    DeletionPlan, DeletionReport, DuplicateGroup, DuplicateSummary, EquivalenceMode, HashStats,
    LibraryStats, Notice, NoticeLevel, format_size,
};

pub fn print_json<T: serde::Serialize>(val: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

pub fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice.level {
            NoticeLevel::Info => println!("{}", notice.message),
            NoticeLevel::Warning => eprintln!("warning: {}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

pub fn print_library_stats(stats: &LibraryStats) {
    println!("Library");
    println!("  Audiobooks:  {}", stats.total_audiobooks);
    println!("  Listening:   {}h (~{} days)", stats.total_hours, stats.total_days());
    println!("  Size:        {}", format_size(stats.total_size_bytes));
    println!("  Authors:     {}", stats.unique_authors);
    println!("  Narrators:   {}", stats.unique_narrators);
}

pub fn print_hash_stats(stats: &HashStats) {
    println!("Content hashes");
    if !stats.hash_column_exists {
        println!("  Not available. Import a library to create the hash column.");
        return;
    }
    println!(
        "  Hashed:      {} / {} ({:.1}%)",
        stats.hashed_count, stats.total_audiobooks, stats.hashed_percentage
    );
    println!("  Pending:     {}", stats.unhashed_count);
    println!("  Dup groups:  {}", stats.duplicate_groups);
}

/// Lists every group with its keeper first. `library_bytes` adds the share of
/// the library the duplicates occupy.
pub fn print_groups(mode: EquivalenceMode, groups: &[DuplicateGroup], library_bytes: Option<u64>) {
    let summary = DuplicateSummary::from_groups(mode, groups);
    println!("{} ({mode} mode)", mode.description());

    if groups.is_empty() {
        println!("\nNo duplicates found.");
        return;
    }

    for group in groups {
        println!(
            "\n{}  [{} copies, {} {}]",
            group.title,
            group.count(),
            format_size(group.wasted_or_savable_bytes),
            mode.savings_label()
        );
        let keeper = group.keeper().into_iter();
        let rest = group.members.iter().filter(|m| m.id != group.keeper_id);
        for member in keeper.chain(rest) {
            let mark = if member.id == group.keeper_id { "KEEP" } else { "    " };
            println!(
                "  {mark} {:>6}  {:>9}  {:>8}  ed.{}  {}",
                member.id,
                format_size(member.file_size_bytes),
                member.duration_formatted(),
                member.edition_count,
                member.file_path
            );
        }
    }

    println!(
        "\n{} group(s), {} extra file(s), {} {}",
        summary.total_groups,
        summary.total_duplicate_files,
        format_size(summary.total_wasted_or_savable_bytes),
        mode.savings_label()
    );
    if let Some(total) = library_bytes.filter(|b| *b > 0) {
        let share = summary.total_wasted_or_savable_bytes as f64 * 100.0 / total as f64;
        println!("That is {share:.1}% of the library.");
    }
}

pub fn print_plan(plan: &DeletionPlan) {
    if plan.to_delete.is_empty() {
        println!("Nothing would be deleted.");
    } else {
        println!("Would delete {} record(s):", plan.to_delete.len());
        for id in &plan.to_delete {
            println!("  {id}");
        }
    }
    if !plan.blocked.is_empty() {
        println!("Protected:");
        for (id, reason) in &plan.blocked {
            println!("  {id}  ({reason})");
        }
    }
}

pub fn print_report(report: &DeletionReport) {
    println!("{}", report.summary());
    print_report_details(report);
}

pub fn print_report_details(report: &DeletionReport) {
    for id in &report.deleted {
        println!("  deleted    {id}");
    }
    for (id, reason) in &report.blocked {
        println!("  protected  {id}  ({reason})");
    }
    for (id, failure) in &report.failed {
        println!("  failed     {id}  ({failure})");
    }
}
