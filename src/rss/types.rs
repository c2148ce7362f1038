//! RSS 2.0 document structure as fetched off the wire.

use serde::Deserialize;

/// One fetched feed document. Unknown elements are ignored; absent optional
/// fields decode to the empty string. `pub_date` stays a raw string here so
/// the caller decides how to interpret it.
#[derive(Debug, Clone, Deserialize)]
pub struct RssDocument {
    pub channel: RssChannel,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RssChannel {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "item")]
    pub items: Vec<RssItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RssItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "pubDate")]
    pub pub_date: String,
}

impl RssDocument {
    /// Resolve HTML character entities in every textual field. Feeds commonly
    /// double-encode ("&amp;amp;"), so decoding repeats until a fixed point;
    /// each pass strictly shrinks the text, so this terminates.
    pub fn unescape(&mut self) {
        self.channel.title = unescape_entities(&self.channel.title);
        self.channel.link = unescape_entities(&self.channel.link);
        self.channel.description = unescape_entities(&self.channel.description);
        for item in &mut self.channel.items {
            item.title = unescape_entities(&item.title);
            item.link = unescape_entities(&item.link);
            item.description = unescape_entities(&item.description);
        }
    }
}

fn unescape_entities(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let decoded = html_escape::decode_html_entities(&current).into_owned();
        if decoded == current {
            return current;
        }
        current = decoded;
    }
}
