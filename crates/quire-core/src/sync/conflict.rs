//! Conflict markers written into note bodies.

use similar::{ChangeTag, TextDiff};

const LOCAL_MARKER: &str = "<<<<<<< Local\n";
const SEPARATOR: &str = "=======\n";
const SERVER_MARKER: &str = ">>>>>>> Server\n";

/// Which side of a conflict the renderer is currently writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffSide {
    Normal,
    Local,
    Server,
}

/// Merge two bodies line by line, wrapping every disagreement in
/// `<<<<<<< Local` / `=======` / `>>>>>>> Server` markers.
pub fn render_body_conflict(local: &str, server: &str) -> String {
    let diff = TextDiff::from_lines(local, server);
    let mut hunks: Vec<(ChangeTag, String)> = Vec::new();
    for change in diff.iter_all_changes() {
        match hunks.last_mut() {
            Some((tag, text)) if *tag == change.tag() => text.push_str(change.value()),
            _ => hunks.push((change.tag(), change.value().to_string())),
        }
    }

    let mut merged = String::with_capacity(local.len() + server.len());
    let mut side = DiffSide::Normal;

    for (tag, text) in hunks {
        match tag {
            ChangeTag::Equal => {
                close(&mut merged, side);
                side = DiffSide::Normal;
                merged.push_str(&text);
            }
            ChangeTag::Delete => {
                if side == DiffSide::Server {
                    merged.push_str(SERVER_MARKER);
                }
                if side != DiffSide::Local {
                    merged.push_str(LOCAL_MARKER);
                }
                side = DiffSide::Local;
                push_line_terminated(&mut merged, &text);
            }
            ChangeTag::Insert => {
                match side {
                    DiffSide::Normal => {
                        merged.push_str(LOCAL_MARKER);
                        merged.push_str(SEPARATOR);
                    }
                    DiffSide::Local => merged.push_str(SEPARATOR),
                    DiffSide::Server => {}
                }
                side = DiffSide::Server;
                push_line_terminated(&mut merged, &text);
            }
        }
    }
    close(&mut merged, side);

    merged
}

/// Block prepended to a note whose book differs between replica and server.
pub fn book_conflict_block(local_label: &str, server_label: &str) -> String {
    format!(
        "{LOCAL_MARKER}Moved to the book {local_label}\n{SEPARATOR}Moved to the book {server_label}\n{SERVER_MARKER}\n"
    )
}

fn close(merged: &mut String, side: DiffSide) {
    match side {
        DiffSide::Normal => {}
        DiffSide::Local => {
            merged.push_str(SEPARATOR);
            merged.push_str(SERVER_MARKER);
        }
        DiffSide::Server => merged.push_str(SERVER_MARKER),
    }
}

fn push_line_terminated(merged: &mut String, text: &str) {
    merged.push_str(text);
    if !text.ends_with('\n') {
        merged.push('\n');
    }
}
