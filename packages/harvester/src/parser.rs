//! Draw result page parsing.
//!
//! Fields are located through structural anchors in the page markup (CSS
//! classes of the result block, the prize table row labelled `1등`, the
//! description meta tag) rather than fixed offsets, so small layout changes
//! around them do not break extraction. A change to the anchors themselves
//! surfaces as [`ParseError::MissingAnchor`].

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{Anchor, ParseError};
use crate::types::DrawRecord;

#[allow(clippy::expect_used)] // Static selectors that are guaranteed to be valid
mod selectors {
    use super::*;

    pub static HEADING: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("div.win_result h4 strong").expect("valid selector"));
    pub static DESC: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("div.win_result p.desc").expect("valid selector"));
    pub static WIN_SECTION: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("div.num.win").expect("valid selector"));
    pub static BONUS_SECTION: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("div.num.bonus").expect("valid selector"));
    pub static BALL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("span.ball_645").expect("valid selector"));
    pub static META_DESCRIPTION: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).expect("valid selector"));
    pub static PRIZE_TABLE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("table.tbl_data").expect("valid selector"));
    pub static ROW: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
    pub static CELL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("td").expect("valid selector"));
}

/// Label of the first prize row in the prize table.
const FIRST_PRIZE_LABEL: &str = "1등";

/// Dates as `2002년 12월 07일`, `2002.12.07`, `2002-12-07` or `2002/12/07`.
#[allow(clippy::expect_used)]
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*[년./-]\s*(\d{1,2})\s*[월./-]\s*(\d{1,2})").expect("valid regex")
});

/// Draw number in the result heading, e.g. `1190회`.
#[allow(clippy::expect_used)]
static HEADING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*회").expect("valid regex"));

/// First prize summary in the description meta tag.
#[allow(clippy::expect_used)]
static META_PRIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"1등\s*총\s*([\d,]+)\s*명.*?([\d,]+)\s*원").expect("valid regex")
});

/// Parse a fetched draw page into a validated record.
///
/// Never panics on malformed input: the result is either a record that
/// satisfies every field constraint or the first violation found.
pub fn parse(content: &str, draw_number: u32) -> Result<DrawRecord, ParseError> {
    let doc = Html::parse_document(content);

    if let Some(found) = heading_draw_number(&doc) {
        if found != draw_number {
            return Err(ParseError::DrawNumberMismatch {
                expected: draw_number,
                found,
            });
        }
    }

    let winning_numbers = extract_winning_numbers(&doc)?;
    let bonus_number = extract_bonus_number(&doc)?;
    let draw_date = extract_draw_date(&doc)?;
    let (winner_count, prize_amount) = extract_first_prize(&doc)?;

    DrawRecord::new(
        draw_number,
        draw_date,
        &winning_numbers,
        bonus_number,
        winner_count,
        prize_amount,
    )
}

/// Draw number shown in the page heading, if the page has one.
///
/// The site answers requests for undrawn numbers with the latest result
/// page, so a heading below the requested number means "not drawn yet".
pub fn page_draw_number(content: &str) -> Option<u32> {
    heading_draw_number(&Html::parse_document(content))
}

fn heading_draw_number(doc: &Html) -> Option<u32> {
    let heading = doc.select(&selectors::HEADING).next()?;
    let text = element_text(heading);
    HEADING_PATTERN
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn extract_winning_numbers(doc: &Html) -> Result<Vec<u8>, ParseError> {
    let section = doc
        .select(&selectors::WIN_SECTION)
        .next()
        .ok_or(ParseError::MissingAnchor(Anchor::WinningNumbers))?;

    section
        .select(&selectors::BALL)
        .map(|ball| parse_ball(&element_text(ball)))
        .collect()
}

fn extract_bonus_number(doc: &Html) -> Result<u8, ParseError> {
    let ball = doc
        .select(&selectors::BONUS_SECTION)
        .next()
        .and_then(|section| section.select(&selectors::BALL).next())
        .ok_or(ParseError::MissingAnchor(Anchor::BonusNumber))?;

    parse_ball(&element_text(ball))
}

fn parse_ball(text: &str) -> Result<u8, ParseError> {
    let value: u32 = text
        .parse()
        .map_err(|_| ParseError::InvalidBall(text.to_string()))?;
    u8::try_from(value).map_err(|_| ParseError::NumberOutOfRange { value })
}

fn extract_draw_date(doc: &Html) -> Result<NaiveDate, ParseError> {
    if let Some(desc) = doc.select(&selectors::DESC).next() {
        let text = element_text(desc);
        return parse_date(&text).ok_or(ParseError::InvalidDate(text));
    }

    // Fallback: the description meta tag carries the date on most pages.
    let meta = meta_description(doc).ok_or(ParseError::MissingAnchor(Anchor::DrawDate))?;
    if !DATE_PATTERN.is_match(&meta) {
        return Err(ParseError::MissingAnchor(Anchor::DrawDate));
    }
    parse_date(&meta).ok_or(ParseError::InvalidDate(meta))
}

/// Parse the first date found in `text`.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use lotto_harvester::parser::parse_date;
///
/// let expected = NaiveDate::from_ymd_opt(2024, 1, 1);
/// assert_eq!(parse_date("(2024년 01월 01일 추첨)"), expected);
/// assert_eq!(parse_date("2024.1.1"), expected);
/// assert_eq!(parse_date("2024/13/01"), None);
/// ```
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let caps = DATE_PATTERN.captures(text)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let day = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn extract_first_prize(doc: &Html) -> Result<(u32, u64), ParseError> {
    if let Some(cells) = first_prize_cells(doc) {
        return parse_prize_values(&cells[2], &cells[3]);
    }

    // Fallback: "1등 총 4명, 1인당 당첨금액 2,002,006,800원" in the meta tag.
    let meta = meta_description(doc).ok_or(ParseError::MissingAnchor(Anchor::FirstPrize))?;
    let caps = META_PRIZE_PATTERN
        .captures(&meta)
        .ok_or(ParseError::MissingAnchor(Anchor::FirstPrize))?;
    let winners = caps.get(1).map_or("", |m| m.as_str());
    let amount = caps.get(2).map_or("", |m| m.as_str());
    parse_prize_values(winners, amount)
}

/// Cells of the prize table row labelled `1등`, when it has at least four.
fn first_prize_cells(doc: &Html) -> Option<Vec<String>> {
    let table = doc.select(&selectors::PRIZE_TABLE).next()?;
    table.select(&selectors::ROW).find_map(|row| {
        let cells: Vec<String> = row.select(&selectors::CELL).map(element_text).collect();
        (cells.len() >= 4 && cells[0] == FIRST_PRIZE_LABEL).then_some(cells)
    })
}

fn parse_prize_values(winners: &str, amount: &str) -> Result<(u32, u64), ParseError> {
    let winner_count = clean_number(winners)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| ParseError::InvalidWinnerCount(winners.to_string()))?;
    let prize_amount =
        clean_number(amount).ok_or_else(|| ParseError::InvalidPrizeAmount(amount.to_string()))?;
    Ok((winner_count, prize_amount))
}

/// Read the digits of a display number, ignoring separators and units.
///
/// # Examples
/// ```
/// use lotto_harvester::parser::clean_number;
///
/// assert_eq!(clean_number("2,002,006,800원"), Some(2_002_006_800));
/// assert_eq!(clean_number("4명"), Some(4));
/// assert_eq!(clean_number("-"), None);
/// ```
pub fn clean_number(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn meta_description(doc: &Html) -> Option<String> {
    doc.select(&selectors::META_DESCRIPTION)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::to_string)
}

/// Text content of an element with whitespace runs collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
