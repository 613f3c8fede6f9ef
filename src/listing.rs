use crate::remote::DeviceClient;
use regex::Regex;
use std::sync::OnceLock;

const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub remote_path: String,
    /// Number from the `img_<n>` token; 0 when the name has none.
    pub sequence: u64,
}

impl ImageEntry {
    pub fn file_name(&self) -> &str {
        self.remote_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.remote_path)
    }
}

fn img_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"img_(\d+)").expect("valid image token pattern"))
}

pub fn is_image_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        _ => false,
    }
}

pub fn sequence_number(name: &str) -> u64 {
    img_token_re()
        .captures(name)
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .unwrap_or(0)
}

/// Image names within `folder`, joined to full paths and ordered by their
/// `img_<n>` token. Names without a token sort as 0, keeping listing order
/// among themselves.
pub fn order_image_entries<S: AsRef<str>>(folder: &str, names: &[S]) -> Vec<ImageEntry> {
    let folder = folder.trim_end_matches('/');
    let mut entries = names
        .iter()
        .filter_map(|name| {
            let name: &str = name.as_ref();
            is_image_name(name).then(|| ImageEntry {
                remote_path: format!("{}/{}", folder, name),
                sequence: sequence_number(name),
            })
        })
        .collect::<Vec<_>>();
    // sort_by_key is stable, which is what keeps token-less names in order.
    entries.sort_by_key(|e| e.sequence);
    entries
}

/// Lists the images of one scan folder. Failures and empty folders are
/// reported here and come back as an empty list.
pub fn fetch_image_list(client: &DeviceClient, folder: &str) -> Vec<ImageEntry> {
    eprintln!("Fetching image list from {}", folder);
    let names = match client.list_files(folder) {
        Ok(names) => names,
        Err(err) => {
            log::warn!("image listing for {folder} failed: {err}");
            eprintln!("Failed to list images: {err}");
            return Vec::new();
        }
    };

    let entries = order_image_entries(folder, &names);
    if entries.is_empty() {
        eprintln!("No images found in {}", folder);
        return entries;
    }

    let untagged = entries.iter().filter(|e| e.sequence == 0).count();
    if untagged > 0 {
        log::debug!("{untagged} images in {folder} carry no img_<n> token");
    }
    eprintln!("Found {} images", entries.len());
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(entries: &[ImageEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.remote_path.as_str()).collect()
    }

    #[test]
    fn keeps_images_and_orders_by_token() {
        let entries = order_image_entries(
            "/scan_1",
            &["img_5.jpg", "img_1.jpg", "note.txt", "img_3.jpg"],
        );
        assert_eq!(
            paths(&entries),
            vec!["/scan_1/img_1.jpg", "/scan_1/img_3.jpg", "/scan_1/img_5.jpg"]
        );
    }

    #[test]
    fn token_is_compared_as_integer() {
        let entries = order_image_entries("/scan_1", &["img_10.jpg", "img_9.jpg", "img_100.jpg"]);
        assert_eq!(
            entries.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![9, 10, 100]
        );
    }

    #[test]
    fn untagged_names_sort_first_in_listing_order() {
        let entries = order_image_entries(
            "/scan_4",
            &["img_2.jpg", "zeta.jpg", "img_1.jpg", "alpha.jpg", "img_0.jpg"],
        );
        assert_eq!(
            paths(&entries),
            vec![
                "/scan_4/zeta.jpg",
                "/scan_4/alpha.jpg",
                "/scan_4/img_0.jpg",
                "/scan_4/img_1.jpg",
                "/scan_4/img_2.jpg",
            ]
        );
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_image_name("img_1.JPG"));
        assert!(is_image_name("img_1.jpeg"));
        assert!(!is_image_name("img_1.png"));
        assert!(!is_image_name("img_1.jpg.txt"));
        assert!(!is_image_name(".jpg"));
        assert!(!is_image_name("jpg"));
    }

    #[test]
    fn jpg_and_jpeg_in_any_case_make_it_into_the_listing() {
        let entries = order_image_entries(
            "/scan_3",
            &[
                "img_4.jpeg",
                "img_2.JPG",
                "img_1.jpg",
                "img_3.Jpeg",
                "img_5.png",
                "img_6.jpg.part",
                ".jpg",
            ],
        );
        assert_eq!(
            paths(&entries),
            vec![
                "/scan_3/img_1.jpg",
                "/scan_3/img_2.JPG",
                "/scan_3/img_3.Jpeg",
                "/scan_3/img_4.jpeg",
            ]
        );
    }

    #[test]
    fn file_name_is_last_segment() {
        let entries = order_image_entries("/scan_2/", &["img_7.jpg"]);
        assert_eq!(entries[0].remote_path, "/scan_2/img_7.jpg");
        assert_eq!(entries[0].file_name(), "img_7.jpg");
    }

    #[test]
    fn nothing_recognized_is_empty() {
        assert!(order_image_entries("/scan_1", &["a.txt", "b.bin"]).is_empty());
    }
}
