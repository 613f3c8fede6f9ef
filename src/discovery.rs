use crate::remote::DeviceClient;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFolder {
    pub path: String,
    pub id: u64,
}

fn scan_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^scan_(\d+)$").expect("valid scan folder pattern"))
}

pub fn order_scan_folders<S: AsRef<str>>(names: &[S]) -> Vec<ScanFolder> {
    let mut folders = names
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let caps = scan_name_re().captures(name)?;
            // Ids too large for u64 are dropped like any other non-match.
            let id = caps[1].parse::<u64>().ok()?;
            Some(ScanFolder {
                path: format!("/{}", name),
                id,
            })
        })
        .collect::<Vec<_>>();
    folders.sort_by_key(|f| f.id);
    folders
}

/// Lists the device's scan folders. Any failure is reported and yields an
/// empty list; callers treat empty as "nothing to do".
pub fn fetch_scan_folders(client: &DeviceClient) -> Vec<ScanFolder> {
    eprintln!("Fetching scan folders from {}", client.base_url());
    match client.list_folders() {
        Ok(names) => {
            let folders = order_scan_folders(&names);
            log::info!(
                "device listed {} folders, {} match scan_<n>",
                names.len(),
                folders.len()
            );
            folders
        }
        Err(err) => {
            log::warn!("folder listing failed: {err}");
            eprintln!("Failed to fetch folders: {err}");
            Vec::new()
        }
    }
}
