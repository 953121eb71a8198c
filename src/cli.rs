// ============================================================================
// oekaki-board CLI — deployment configuration via command-line arguments
// ============================================================================
//
// Usage examples:
//   oekaki-board --store-url https://store.example.net --collection oekaki
//   oekaki-board --playlist art.json --playlist photos.json
//   oekaki-board --record-limit 300 --gallery-limit 100 --host-messages

use std::path::PathBuf;

use clap::Parser;

/// Embeddable drawing board with a shared gallery.
///
/// Draw, submit to a remote gallery, and browse submissions and curated
/// playlists in a slideshow lightbox.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "oekaki-board",
    about = "Drawing board with a shared remote gallery",
    long_about = "A freehand drawing widget that submits finished sketches to a\n\
                  remote object/document store and browses previous submissions\n\
                  (plus curated image playlists) in a modal lightbox.\n\n\
                  Example:\n  \
                  oekaki-board --store-url https://store.example.net --playlist art.json"
)]
pub struct CliArgs {
    /// Base URL of the remote store (object store + document store).
    #[arg(long, value_name = "URL", default_value = "http://localhost:8787")]
    pub store_url: String,

    /// Document-store collection holding submission records.
    #[arg(long, value_name = "NAME", default_value = "oekaki")]
    pub collection: String,

    /// Curated playlist manifest(s): JSON files shaped either
    /// {"images": [{"src", "alt"}, ...]} or a bare array of the same items.
    /// May be given multiple times.
    #[arg(long, value_name = "FILE")]
    pub playlist: Vec<PathBuf>,

    /// Submission ceiling — submits are refused once the collection holds
    /// this many records.
    #[arg(long, default_value_t = 300, value_name = "N")]
    pub record_limit: u64,

    /// Maximum number of records fetched per gallery load (newest first).
    #[arg(long, default_value_t = 100, value_name = "N")]
    pub gallery_limit: u32,

    /// Embedding switch: emit host-frame messages (resize-iframe /
    /// expand-iframe / shrink-iframe) as JSON lines on stdout. Pass this
    /// whenever a parent page hosts the widget and consumes the channel;
    /// standalone runs leave stdout silent.
    #[arg(long, default_value_t = false)]
    pub host_messages: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_suit_a_standalone_run() {
        let args = CliArgs::parse_from(["oekaki-board"]);
        assert_eq!(args.store_url, "http://localhost:8787");
        assert_eq!(args.collection, "oekaki");
        assert_eq!(args.record_limit, 300);
        assert_eq!(args.gallery_limit, 100);
        assert!(args.playlist.is_empty());
        assert!(!args.host_messages);
    }

    #[test]
    fn host_messages_flag_enables_the_embedding_channel() {
        let args = CliArgs::parse_from(["oekaki-board", "--host-messages"]);
        assert!(args.host_messages);
    }
}
