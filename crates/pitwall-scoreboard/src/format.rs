//! Text rendering of times and of the board.

use std::fmt::Write;

use crate::standings::{Board, LapHighlight, StandingRow};

/// Format a lap time: `S.mmm` under a minute, `M:SS.mmm` otherwise.
pub fn format_lap_time(millis: u64) -> String {
    let total_secs = millis / 1000;
    let ms = millis % 1000;
    let minutes = total_secs / 60;
    let secs = total_secs % 60;
    if minutes == 0 {
        format!("{secs}.{ms:03}")
    } else {
        format!("{minutes}:{secs:02}.{ms:03}")
    }
}

/// Format a race clock value in seconds as `MM:SS`.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Format a gap to the leader.
pub fn format_gap(millis: u64) -> String {
    format!("+{}", format_lap_time(millis))
}

fn clock_or_blank(seconds: Option<u64>) -> String {
    seconds.map_or_else(|| "--:--".to_owned(), format_clock)
}

fn marker(highlight: LapHighlight) -> char {
    match highlight {
        LapHighlight::OverallBest => '*',
        LapHighlight::PersonalBest => '^',
        LapHighlight::Normal => ' ',
    }
}

/// Render the whole board as text.
///
/// Best and last laps carry a marker: `*` for the session best, `^` for a
/// personal best.
pub fn render_board(board: &Board) -> String {
    let mut out = String::new();
    let link = if board.connected { "live" } else { "offline" };
    let _ = writeln!(
        out,
        "PITWALL  [{link}]  left {}  elapsed {}",
        clock_or_blank(board.clock.left),
        clock_or_blank(board.clock.elapsed),
    );

    if board.stub_visible {
        let _ = writeln!(out, "  waiting for the next session");
        return out;
    }

    let _ = writeln!(
        out,
        "{:>3}  {:>4}  {:<24} {:>4}  {:>10}  {:>10}  {:>10}",
        "#", "Kart", "Driver", "Laps", "Best", "Last", "Gap"
    );
    for row in &board.rows {
        let _ = writeln!(out, "{}", render_row(row));
    }
    out
}

fn render_row(row: &StandingRow) -> String {
    let has_laps = row.laps > 0;
    let laps = if has_laps { row.laps.to_string() } else { String::new() };
    let best = match row.best_time {
        Some(time) if has_laps => {
            let mark = if row.best_is_overall { '*' } else { ' ' };
            format!("{}{mark}", format_lap_time(time))
        }
        _ => String::new(),
    };
    let last = row
        .last_lap
        .map(|lap| format!("{}{}", format_lap_time(lap.time), marker(lap.highlight)))
        .unwrap_or_default();
    let gap = row.gap.map(format_gap).unwrap_or_default();

    format!(
        "{:>3}  {:>4}  {:<24} {:>4}  {best:>10}  {last:>10}  {gap:>10}",
        row.position, row.kart, row.name, laps
    )
    .trim_end()
    .to_owned()
}
