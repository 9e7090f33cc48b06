//! Directory listing parser.
//!
//! Servers answer `LIST` in whatever shape their platform prefers, so each
//! line is tried against the recognised layouts in turn:
//!
//! 1. MLSD facts (RFC 3659): `type=file;size=1234;modify=20260101120000; file.txt`
//! 2. Unix `ls -l`: `-rw-r--r-- 1 owner group 1234 Jan  1 12:00 file.txt`
//! 3. DOS / IIS: `01-01-26  12:00AM       1234 file.txt`
//!
//! A line matching none of them becomes an `Unknown` entry named after the
//! trimmed line, so nothing the server reports is silently lost.

use crate::ftp::types::{FtpEntry, FtpEntryKind};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNIX_RE: Regex = Regex::new(
        r"(?x)
        ^([dlcbps-][rwxsStT-]{9})[+@.]?\s+  # mode
        (\d+)\s+                            # links
        (\S+)\s+                            # owner
        (\S+)\s+                            # group
        (\d+)\s+                            # size
        (\w{3}\s+\d{1,2}\s+[\d:]+)\s+       # date
        (.+)$                               # name [-> target]
        "
    )
    .expect("valid unix listing regex");
    static ref DOS_RE: Regex = Regex::new(
        r"(?x)
        ^(\d{2}-\d{2}-\d{2,4})\s+           # date
        (\d{1,2}:\d{2}(?:AM|PM)?)\s+        # time
        (<DIR>|\d+)\s+                      # size or <DIR>
        (.+)$                               # name
        "
    )
    .expect("valid dos listing regex");
}

/// Parse a full LIST or MLSD body. `.` and `..` are dropped.
pub fn parse_listing(raw: &str) -> Vec<FtpEntry> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("total "))
        .map(parse_line)
        .filter(|e| e.name != "." && e.name != "..")
        .collect()
}

/// Parse a single listing line.
pub fn parse_line(line: &str) -> FtpEntry {
    if line.contains('=') && line.contains(';') {
        if let Some(e) = parse_mlsd(line) {
            return e;
        }
    }
    if let Some(e) = parse_unix(line) {
        return e;
    }
    if let Some(e) = parse_dos(line) {
        return e;
    }
    log::debug!("Unrecognised listing line: {}", line);
    let mut entry = FtpEntry::new(line, FtpEntryKind::Unknown, 0);
    entry.raw = Some(line.to_string());
    entry
}

// ─── MLSD ────────────────────────────────────────────────────────────

fn parse_mlsd(line: &str) -> Option<FtpEntry> {
    // Facts end at the first "; " (RFC 3659 §7.2); tolerate a missing space.
    let (facts_str, name) = match line.find("; ") {
        Some(pos) => (&line[..pos], &line[pos + 2..]),
        None => {
            let pos = line.rfind(';')?;
            (&line[..pos], &line[pos + 1..])
        }
    };
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut entry = FtpEntry::new(name, FtpEntryKind::Unknown, 0);
    for fact in facts_str.split(';').map(str::trim).filter(|f| !f.is_empty()) {
        if let Some((k, v)) = fact.split_once('=') {
            entry.facts.insert(k.to_ascii_lowercase(), v.to_string());
        }
    }

    let kind_fact = entry.facts.get("type").map(|t| t.to_ascii_lowercase());
    entry.kind = match kind_fact.as_deref() {
        Some("dir") | Some("cdir") | Some("pdir") => FtpEntryKind::Directory,
        Some("file") => FtpEntryKind::File,
        Some(t) if t.starts_with("os.unix=slink") || t.starts_with("os.unix=symlink") => {
            FtpEntryKind::Symlink
        }
        _ => FtpEntryKind::Unknown,
    };
    if entry.kind == FtpEntryKind::Symlink {
        entry.link_target = entry
            .facts
            .get("type")
            .and_then(|t| t.split_once(':'))
            .map(|(_, target)| target.to_string())
            .filter(|t| !t.is_empty());
    }

    entry.size = entry
        .facts
        .get("size")
        .or_else(|| entry.facts.get("sizd"))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    entry.modified = entry.facts.get("modify").and_then(|v| parse_mlsd_time(v));
    entry.permissions = entry.facts.get("unix.mode").cloned();
    entry.owner = entry.facts.get("unix.owner").cloned();
    entry.group = entry.facts.get("unix.group").cloned();
    entry.raw = Some(line.to_string());
    Some(entry)
}

/// `YYYYMMDDHHMMSS[.sss]`
fn parse_mlsd_time(s: &str) -> Option<DateTime<Utc>> {
    let base = s.get(..14)?;
    NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

// ─── Unix ────────────────────────────────────────────────────────────

fn parse_unix(line: &str) -> Option<FtpEntry> {
    let caps = UNIX_RE.captures(line)?;
    let mode = caps.get(1)?.as_str();
    let kind = match mode.as_bytes().first() {
        Some(b'd') => FtpEntryKind::Directory,
        Some(b'l') => FtpEntryKind::Symlink,
        Some(b'-') => FtpEntryKind::File,
        _ => FtpEntryKind::Unknown,
    };

    let name_field = caps.get(7)?.as_str();
    let (name, link_target) = match (kind, name_field.split_once(" -> ")) {
        (FtpEntryKind::Symlink, Some((n, t))) => (n, Some(t.to_string())),
        _ => (name_field, None),
    };

    let mut entry = FtpEntry::new(
        name,
        kind,
        caps.get(5)?.as_str().parse().unwrap_or(0),
    );
    entry.permissions = Some(mode.to_string());
    entry.owner = Some(caps[3].to_string());
    entry.group = Some(caps[4].to_string());
    entry.link_target = link_target;
    entry.modified = parse_unix_date(&caps[6], Utc::now());
    entry.raw = Some(line.to_string());
    Some(entry)
}

/// `Jan  1 12:00` (within the last six months) or `Jan  1  2025`.
fn parse_unix_date(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let normalised = s.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalised.contains(':') {
        let this_year = NaiveDateTime::parse_from_str(
            &format!("{} {}", now.year(), normalised),
            "%Y %b %d %H:%M",
        )
        .ok()?;
        let dt = Utc.from_utc_datetime(&this_year);
        // A time-of-day stamp in the future belongs to last year.
        if dt > now + chrono::Duration::days(1) {
            let last_year = NaiveDateTime::parse_from_str(
                &format!("{} {}", now.year() - 1, normalised),
                "%Y %b %d %H:%M",
            )
            .ok()?;
            return Some(Utc.from_utc_datetime(&last_year));
        }
        return Some(dt);
    }

    let date = NaiveDate::parse_from_str(&normalised, "%b %d %Y").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

// ─── DOS / IIS ───────────────────────────────────────────────────────

fn parse_dos(line: &str) -> Option<FtpEntry> {
    let caps = DOS_RE.captures(line)?;
    let (kind, size) = match &caps[3] {
        "<DIR>" => (FtpEntryKind::Directory, 0),
        n => (FtpEntryKind::File, n.parse().unwrap_or(0)),
    };
    let mut entry = FtpEntry::new(caps[4].trim_end(), kind, size);
    entry.modified = parse_dos_date(&caps[1], &caps[2]);
    entry.raw = Some(line.to_string());
    Some(entry)
}

fn parse_dos_date(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{} {}", date, time);
    ["%m-%d-%y %I:%M%p", "%m-%d-%y %H:%M", "%m-%d-%Y %I:%M%p", "%m-%d-%Y %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&combined, fmt).ok())
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_file_and_dir() {
        let raw = "total 8\r\n\
                   -rw-r--r--   1 user group  1234 Jan  1 12:00 readme.txt\r\n\
                   drwxr-xr-x   2 root root   4096 Mar  1  2024 sub dir\r\n";
        let entries = parse_listing(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "readme.txt");
        assert_eq!(entries[0].kind, FtpEntryKind::File);
        assert_eq!(entries[0].size, 1234);
        assert_eq!(entries[0].owner.as_deref(), Some("user"));
        assert_eq!(entries[1].name, "sub dir");
        assert_eq!(entries[1].kind, FtpEntryKind::Directory);
        assert_eq!(entries[1].modified.map(|d| d.year()), Some(2024));
    }

    #[test]
    fn unix_symlink_splits_target() {
        let e = parse_line("lrwxrwxrwx   1 root root    22 Jan  5 08:00 latest -> /pub/v2");
        assert_eq!(e.kind, FtpEntryKind::Symlink);
        assert_eq!(e.name, "latest");
        assert_eq!(e.link_target.as_deref(), Some("/pub/v2"));
    }

    #[test]
    fn unix_device_is_unknown_kind() {
        let e = parse_line("crw-rw-rw-   1 root root     0 Jan  5 08:00 null");
        assert_eq!(e.kind, FtpEntryKind::Unknown);
        assert_eq!(e.name, "null");
    }

    #[test]
    fn future_time_rolls_back_a_year() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let dt = parse_unix_date("Dec 24 18:30", now).unwrap();
        assert_eq!(dt.year(), 2025);
        let dt = parse_unix_date("Jan 24 18:30", now).unwrap();
        assert_eq!(dt.year(), 2026);
    }

    #[test]
    fn mlsd_facts() {
        let e = parse_line("type=file;size=1024;modify=20260101120000.123;UNIX.mode=0644; example.bin");
        assert_eq!(e.name, "example.bin");
        assert_eq!(e.kind, FtpEntryKind::File);
        assert_eq!(e.size, 1024);
        assert_eq!(e.permissions.as_deref(), Some("0644"));
        assert_eq!(
            e.modified,
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn mlsd_symlink_and_dots() {
        let raw = "type=cdir; .\ntype=pdir; ..\ntype=OS.unix=slink:/srv/data; data\ntype=dir; logs";
        let entries = parse_listing(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, FtpEntryKind::Symlink);
        assert_eq!(entries[0].link_target.as_deref(), Some("/srv/data"));
        assert_eq!(entries[1].kind, FtpEntryKind::Directory);
    }

    #[test]
    fn dos_lines() {
        let entries = parse_listing(
            "01-01-26  12:00AM      <DIR> My Documents\n02-14-26  03:45PM       2048 notes.txt",
        );
        assert_eq!(entries[0].kind, FtpEntryKind::Directory);
        assert_eq!(entries[0].name, "My Documents");
        assert_eq!(entries[1].kind, FtpEntryKind::File);
        assert_eq!(entries[1].size, 2048);
    }

    #[test]
    fn unrecognised_line_is_kept() {
        let e = parse_line("something odd");
        assert_eq!(e.kind, FtpEntryKind::Unknown);
        assert_eq!(e.name, "something odd");
        assert_eq!(e.size, 0);
    }
}
