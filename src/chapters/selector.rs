//! Chapter selection: named lookup with a middle-of-video fallback

use super::Chapter;
use tracing::debug;

/// Find the chapter matching one of `candidate_names`, highest priority first.
///
/// Matching is case-insensitive and runs in three tiers; the first tier with
/// any hit wins:
/// 1. exact title match, preferring the longest candidate phrase, then the
///    earliest chapter
/// 2. the title contains a candidate phrase
/// 3. a candidate phrase contains the title
pub fn find_chapter_by_name<'a, S: AsRef<str>>(
    chapters: &'a [Chapter],
    candidate_names: &[S],
) -> Option<&'a Chapter> {
    let names: Vec<String> = candidate_names
        .iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    if chapters.is_empty() || names.is_empty() {
        return None;
    }

    let titles: Vec<String> = chapters
        .iter()
        .map(|chapter| chapter.title.trim().to_lowercase())
        .collect();

    // Tier 1: exact
    let mut exact: Option<(usize, usize)> = None; // (name length, chapter index)
    for name in &names {
        if let Some(index) = titles.iter().position(|title| title == name) {
            let better = match exact {
                None => true,
                Some((len, best_index)) => {
                    name.len() > len || (name.len() == len && index < best_index)
                }
            };
            if better {
                exact = Some((name.len(), index));
            }
        }
    }
    if let Some((_, index)) = exact {
        debug!("Exact chapter match: '{}'", chapters[index].title);
        return Some(&chapters[index]);
    }

    // Tier 2: title contains phrase
    for name in &names {
        if let Some(index) = titles.iter().position(|title| title.contains(name.as_str())) {
            debug!("Substring chapter match for '{}': '{}'", name, chapters[index].title);
            return Some(&chapters[index]);
        }
    }

    // Tier 3: phrase contains title
    for name in &names {
        if let Some(index) = titles
            .iter()
            .position(|title| !title.is_empty() && name.contains(title.as_str()))
        {
            debug!("Reverse substring chapter match for '{}': '{}'", name, chapters[index].title);
            return Some(&chapters[index]);
        }
    }

    None
}

/// Pick the shortest chapter starting within a quarter of the video's length
/// from its midpoint. The video's length is the last chapter's end.
pub fn find_fallback_chapter(chapters: &[Chapter]) -> Option<&Chapter> {
    let total = chapters.last()?.end as f64;
    let middle = total / 2.0;
    let window = total / 4.0;

    let mut best: Option<&Chapter> = None;
    for chapter in chapters {
        if (chapter.start as f64 - middle).abs() >= window {
            continue;
        }
        match best {
            Some(current) if current.duration <= chapter.duration => {}
            _ => best = Some(chapter),
        }
    }

    if let Some(chapter) = best {
        debug!("Fallback chapter near the middle: '{}' ({}s)", chapter.title, chapter.duration);
    }
    best
}

/// Named match first, then the middle-of-video fallback
pub fn find_quick_bits_chapter<'a, S: AsRef<str>>(
    chapters: &'a [Chapter],
    candidate_names: &[S],
) -> Option<&'a Chapter> {
    find_chapter_by_name(chapters, candidate_names).or_else(|| find_fallback_chapter(chapters))
}
