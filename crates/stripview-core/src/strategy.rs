//! Ingestion strategy selection from payload size and free heap

use crate::config::ImageApiConfig;
use crate::error::ImageError;
use crate::session::IngestMode;

/// Picks how an upload is buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategySelector {
    decode_headroom: usize,
    max_strip_size: usize,
}

impl StrategySelector {
    pub fn new(config: &ImageApiConfig) -> Self {
        Self {
            decode_headroom: config.decode_headroom,
            max_strip_size: config.max_strip_size,
        }
    }

    /// Mode for a payload of `declared` bytes with `free` bytes of heap
    ///
    /// `StripStreaming` means the whole payload does not fit but a single
    /// strip would; the caller decides whether that is acceptable.
    pub fn select(&self, declared: usize, free: usize) -> Result<IngestMode, ImageError> {
        if declared.saturating_add(self.decode_headroom) <= free {
            return Ok(IngestMode::SingleBuffer);
        }
        let strip_need = self.max_strip_size + self.decode_headroom;
        if strip_need <= free {
            return Ok(IngestMode::StripStreaming);
        }
        Err(ImageError::Memory {
            needed: strip_need,
            free,
        })
    }

    /// Whether one strip of `strip_len` bytes can be taken in now
    pub fn check_strip(&self, strip_len: usize, free: usize) -> Result<(), ImageError> {
        let needed = strip_len.saturating_add(self.decode_headroom);
        if needed > free {
            return Err(ImageError::Memory { needed, free });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> StrategySelector {
        StrategySelector::new(&ImageApiConfig::default())
    }

    #[test]
    fn plenty_of_heap_buffers_whole_image() {
        assert_eq!(
            selector().select(60_000, 200_000),
            Ok(IngestMode::SingleBuffer)
        );
    }

    #[test]
    fn tight_heap_requires_strips() {
        // 60 KB + 50 KiB headroom does not fit in 100 KB, one 32 KiB strip does
        assert_eq!(
            selector().select(60_000, 100_000),
            Ok(IngestMode::StripStreaming)
        );
    }

    #[test]
    fn exhausted_heap_is_a_memory_error() {
        assert_eq!(
            selector().select(60_000, 40_000),
            Err(ImageError::Memory {
                needed: 32 * 1024 + 50 * 1024,
                free: 40_000
            })
        );
    }

    #[test]
    fn strip_check_includes_headroom() {
        let s = selector();
        assert!(s.check_strip(8_000, 8_000 + 51_200).is_ok());
        assert!(s.check_strip(8_000, 8_000 + 51_199).is_err());
    }
}
