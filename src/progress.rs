//! Human-readable progress lines for the terminal.

use std::io::{self, Write};
use std::sync::Mutex;

use site_sync_core::progress::{Progress, ProgressEvent};

/// Writes one line per event. Write failures are ignored.
pub struct TerminalProgress<W: Write + Send> {
    out: Mutex<W>,
}

impl TerminalProgress<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> TerminalProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Progress for TerminalProgress<W> {
    fn report(&self, event: ProgressEvent) {
        let line = format_event(&event);
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
        }
    }
}

pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::CheckingOngoingInvalidations { distribution_id } => {
            format!("Checking for ongoing invalidations on {distribution_id}")
        }
        ProgressEvent::Scanning { root } => format!("Scanning {root}"),
        ProgressEvent::Fingerprinting { files } => format!("Fingerprinting {files} files"),
        ProgressEvent::Uploading { files } => format!("Syncing {files} files"),
        ProgressEvent::Unchanged { relative_path, key } => {
            format!("Not changed {relative_path} => {key}")
        }
        ProgressEvent::Uploaded {
            relative_path,
            key,
            dry_run: false,
        } => format!("Uploaded {relative_path} => {key}"),
        ProgressEvent::Uploaded {
            relative_path,
            key,
            dry_run: true,
        } => format!("Would upload {relative_path} => {key}"),
        ProgressEvent::Invalidating {
            distribution_id,
            paths,
        } => format!("Invalidating {paths} path(s) on {distribution_id}"),
    }
}
