//! File operations for notes
//!
//! Every note is mirrored to a plain text file: a short header, a rule of
//! dashes, then the body.

use chrono::{DateTime, Local, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_FILENAME_CHARS: usize = 100;
const MIN_FILENAME_CHARS: usize = 3;
const HEADER_RULE_WIDTH: usize = 50;
const FILE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Turn a note title into a safe `.txt` filename
/// (e.g. "Trip: Paris/Rome" -> "Trip_ Paris_Rome.txt")
pub fn sanitize_filename(title: &str) -> String {
    let mut filename: String = title
        .chars()
        .map(|c| if INVALID_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_FILENAME_CHARS)
        .collect();

    if filename.chars().count() < MIN_FILENAME_CHARS {
        filename = format!("note_{}", Local::now().format("%Y%m%d_%H%M%S"));
    }

    if !filename.ends_with(".txt") {
        filename.push_str(".txt");
    }
    filename
}

/// Header fields written above the note body
pub struct NoteHeader<'a> {
    pub title: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub session_id: Option<&'a str>,
}

/// Render the full file text for a note
pub fn render_note_file(header: &NoteHeader, content: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Title: {}\n", header.title));
    out.push_str(&format!(
        "Created: {}\n",
        header.created_at.with_timezone(&Local).format(FILE_TIME_FORMAT)
    ));
    if let Some(updated) = header.updated_at {
        out.push_str(&format!(
            "Updated: {}\n",
            updated.with_timezone(&Local).format(FILE_TIME_FORMAT)
        ));
    }
    if let Some(session) = header.session_id {
        out.push_str(&format!("Session: {}\n", session));
    }
    out.push_str(&format!("\n{}\n\n", "-".repeat(HEADER_RULE_WIDTH)));
    out.push_str(content);
    out
}

/// Write a note file (creates parent directories as needed)
pub fn write_note(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Shopping List"), "Shopping List.txt");
        assert_eq!(sanitize_filename("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j.txt");
        assert_eq!(sanitize_filename("already.txt"), "already.txt");

        let long = "x".repeat(150);
        assert_eq!(sanitize_filename(&long), format!("{}.txt", "x".repeat(100)));

        let short = sanitize_filename("hi");
        assert!(short.starts_with("note_"));
        assert!(short.ends_with(".txt"));
    }

    #[test]
    fn test_render_note_file_layout() {
        let created = Utc::now();
        let text = render_note_file(
            &NoteHeader {
                title: "Ideas",
                created_at: created,
                updated_at: None,
                session_id: Some("abc"),
            },
            "build a robot",
        );

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Title: Ideas");
        assert!(lines[1].starts_with("Created: "));
        assert_eq!(lines[2], "Session: abc");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "-".repeat(50));
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "build a robot");
        assert!(!text.contains("Updated:"));
    }

    #[test]
    fn test_write_note_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("Ideas.txt");

        write_note(&path, "Title: Ideas\n\nbody").unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("body"));
    }
}
