//! Concurrent decoding of input files
//!
//! Several decoder subprocesses run at once, but their results are consumed
//! in file order so every station keeps its subsets in "file, then in-file"
//! order. Each subset is annotated with its qualifiers and handed to the
//! station router as soon as its file is decoded.

use super::discovery::InputFile;
use crate::bufr::BufrDumper;
use crate::error::Result;
use crate::qualifier::annotate;
use crate::station::{RoutedStations, StationRouter};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error};

/// Everything learned from decoding the selected files
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    pub routed: RoutedStations,
    pub files_processed: usize,
    pub records_skipped: usize,
}

/// Streams input files through the external decoder
#[derive(Debug, Clone)]
pub struct StreamingDecoder {
    dumper: BufrDumper,
    max_concurrent_files: usize,
}

impl StreamingDecoder {
    pub fn new(dumper: BufrDumper, max_concurrent_files: usize) -> Self {
        Self {
            dumper,
            max_concurrent_files: max_concurrent_files.max(1),
        }
    }

    fn progress_bar(len: usize) -> ProgressBar {
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message("Decoding BUFR files");
        pb
    }

    /// Decode `files` in order and route every subset. A decoder failure stops the run.
    pub async fn decode_and_route(
        &self,
        files: &[InputFile],
        mut router: StationRouter,
    ) -> Result<DecodeOutcome> {
        let pb = Self::progress_bar(files.len());
        let concurrent_limit = self.max_concurrent_files.min(files.len()).max(1);
        debug!(
            "Decoding {} files with up to {} decoder processes",
            files.len(),
            concurrent_limit
        );

        let mut decoded = stream::iter(files)
            .map(|file| {
                let pb = pb.clone();
                async move {
                    if let Some(name) = file.path.file_name() {
                        pb.set_message(format!("Decoding: {}", name.to_string_lossy()));
                    }
                    let result = self.dumper.decode(&file.path).await;
                    pb.inc(1);
                    result
                }
            })
            .buffered(concurrent_limit);

        let mut files_processed = 0usize;
        let mut records_skipped = 0usize;

        while let Some(result) = decoded.next().await {
            let file = match result {
                Ok(file) => file,
                Err(e) => {
                    error!("{}", e);
                    pb.abandon_with_message("Decoding failed");
                    return Err(e);
                }
            };
            files_processed += 1;
            records_skipped += file.records_skipped;
            debug!(
                "Decoded {} subsets from {}",
                file.subsets.len(),
                file.path.display()
            );

            router.extend(file.subsets.into_iter().map(|mut subset| {
                annotate(&mut subset);
                subset
            }));
        }

        pb.finish_with_message("All BUFR files decoded");

        Ok(DecodeOutcome {
            routed: router.finish(),
            files_processed,
            records_skipped,
        })
    }
}
