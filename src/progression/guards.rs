//! Argument checks run before any content generation request.

use crate::error::{LearnerError, LearnerResult};

pub fn check_title(title: &str) -> LearnerResult<()> {
    if title.trim().is_empty() {
        return Err(LearnerError::invalid("no title given"));
    }
    Ok(())
}

pub fn check_topic(topic: &str) -> LearnerResult<()> {
    if topic.trim().is_empty() {
        return Err(LearnerError::invalid("no topic given"));
    }
    Ok(())
}

pub fn check_page_range(title: &str, target_page: u32, current_page: u32) -> LearnerResult<()> {
    check_title(title)?;
    if target_page < 1 {
        return Err(LearnerError::invalid(format!(
            "target page must be at least 1 for {}",
            title
        )));
    }
    if current_page > target_page {
        return Err(LearnerError::invalid(format!(
            "current page {} is past target page {} for {}",
            current_page, target_page, title
        )));
    }
    Ok(())
}

/// Chapters are unsigned, so only the title can be wrong.
pub fn check_chapter(title: &str, _chapter: u32) -> LearnerResult<()> {
    check_title(title)
}

/// Page the next by-page summary ends at: one split further than the current position,
/// never past the last page. A book with fewer pages than `split` gets 0 on every call
/// and can never advance; the engine reports it by name.
pub fn page_target(current_page: u32, total_pages: u32, split: u32) -> u32 {
    let step = total_pages / split.max(1);
    let target = if current_page > 0 {
        current_page.saturating_add(step)
    } else {
        step
    };
    target.min(total_pages)
}

/// Within one page of the end counts as done, absorbing split rounding.
pub fn is_last_page_chunk(target_page: u32, total_pages: u32) -> bool {
    target_page.abs_diff(total_pages) <= 1
}
