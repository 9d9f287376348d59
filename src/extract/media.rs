//! Media link collection
//!
//! Pulls image, audio, and video URLs out of fixed tag/attribute
//! patterns plus a file-extension sniff over anchors. Every candidate is
//! resolved against the page's final URL and filtered through the crawl
//! scope before it is kept.

use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use url::Url;

use crate::extract::ExtractionOptions;
use crate::link::normalize_link;

/// File-extension sniffs; the extension must sit right before the end of
/// the URL, a query, or a fragment.
const IMAGE_FILE_PATTERN: &str = r"(?i)\.(?:avif|bmp|gif|ico|jpe?g|png|svg|tiff?|webp)(?:[?#]|$)";
const AUDIO_FILE_PATTERN: &str = r"(?i)\.(?:aac|flac|m4a|mp3|oga|ogg|opus|wav|weba)(?:[?#]|$)";
const VIDEO_FILE_PATTERN: &str = r"(?i)\.(?:m3u8|m4v|mov|mp4|mpeg|mpg|ogv|webm)(?:[?#]|$)";

/// Cap per media type
const MAX_MEDIA_LINKS: usize = 1000;

/// Media URLs grouped by type, in discovery order
#[derive(Debug, Clone, Default)]
pub struct MediaLinks {
    pub images: Vec<String>,
    pub audio: Vec<String>,
    pub video: Vec<String>,
}

impl MediaLinks {
    /// JSON bundle for the record metadata, counts included.
    pub fn to_value(&self) -> Value {
        json!({
            "images": self.images,
            "audio": self.audio,
            "video": self.video,
            "counts": {
                "images": self.images.len(),
                "audio": self.audio.len(),
                "video": self.video.len(),
            }
        })
    }
}

/// Deduplicated URL list preserving insertion order
#[derive(Default)]
struct MediaSet {
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl MediaSet {
    fn push(&mut self, url: Url) {
        let url = url.to_string();
        if self.seen.insert(url.clone()) {
            self.urls.push(url);
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.urls.truncate(MAX_MEDIA_LINKS);
        self.urls
    }
}

pub(crate) fn collect_media_links(
    document: &Html,
    final_url: &Url,
    options: &ExtractionOptions,
    in_scope: &dyn Fn(&Url) -> bool,
) -> MediaLinks {
    let mut images = MediaSet::default();
    let mut audio = MediaSet::default();
    let mut video = MediaSet::default();

    if options.include_image_links {
        for value in attr_values(document, "img[src], source[src]", "src") {
            push_candidate(&mut images, &value, final_url, in_scope);
        }
        for value in attr_values(
            document,
            "meta[property='og:image'][content], meta[name='twitter:image'][content]",
            "content",
        ) {
            push_candidate(&mut images, &value, final_url, in_scope);
        }
        for value in attr_values(document, "link[rel='image_src'][href]", "href") {
            push_candidate(&mut images, &value, final_url, in_scope);
        }
        for srcset in attr_values(document, "img[srcset], source[srcset]", "srcset") {
            for candidate in srcset_candidates(&srcset) {
                push_candidate(&mut images, candidate, final_url, in_scope);
            }
        }
        sniff_anchors(document, IMAGE_FILE_PATTERN, &mut images, final_url, in_scope);
    }

    if options.include_audio_links {
        for value in attr_values(
            document,
            "audio[src], audio source[src], source[type^='audio/'][src]",
            "src",
        ) {
            push_candidate(&mut audio, &value, final_url, in_scope);
        }
        for value in attr_values(document, "meta[property='og:audio'][content]", "content") {
            push_candidate(&mut audio, &value, final_url, in_scope);
        }
        sniff_anchors(document, AUDIO_FILE_PATTERN, &mut audio, final_url, in_scope);
    }

    if options.include_video_links {
        for value in attr_values(
            document,
            "video[src], video source[src], source[type^='video/'][src]",
            "src",
        ) {
            push_candidate(&mut video, &value, final_url, in_scope);
        }
        for value in attr_values(document, "meta[property='og:video'][content]", "content") {
            push_candidate(&mut video, &value, final_url, in_scope);
        }
        sniff_anchors(document, VIDEO_FILE_PATTERN, &mut video, final_url, in_scope);
    }

    MediaLinks {
        images: images.finish(),
        audio: audio.finish(),
        video: video.finish(),
    }
}

fn push_candidate(set: &mut MediaSet, raw: &str, final_url: &Url, in_scope: &dyn Fn(&Url) -> bool) {
    if let Some(resolved) = normalize_link(final_url, raw) {
        if in_scope(&resolved) {
            set.push(resolved);
        }
    }
}

/// Anchors whose resolved URL carries a media file extension.
fn sniff_anchors(
    document: &Html,
    pattern: &str,
    set: &mut MediaSet,
    final_url: &Url,
    in_scope: &dyn Fn(&Url) -> bool,
) {
    if let Ok(regex) = Regex::new(pattern) {
        for href in attr_values(document, "a[href]", "href") {
            if let Some(resolved) = normalize_link(final_url, &href) {
                if regex.is_match(resolved.as_str()) && in_scope(&resolved) {
                    set.push(resolved);
                }
            }
        }
    }
}

/// Non-empty trimmed values of `attr` across all matches of `selector`.
fn attr_values(document: &Html, selector: &str, attr: &str) -> Vec<String> {
    let mut values = Vec::new();
    if let Ok(parsed) = Selector::parse(selector) {
        for element in document.select(&parsed) {
            if let Some(value) = element.value().attr(attr) {
                let value = value.trim();
                if !value.is_empty() {
                    values.push(value.to_string());
                }
            }
        }
    }
    values
}

/// First whitespace-separated token of each comma-separated srcset entry.
fn srcset_candidates(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
        .filter(|candidate| !candidate.is_empty())
}
