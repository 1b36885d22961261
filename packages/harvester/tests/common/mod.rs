//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use lotto_harvester::config::FetchConfig;
use lotto_harvester::http::{DrawSource, Fetcher};
use lotto_harvester::types::{FatalFailure, FetchOutcome};

/// Values shown on a rendered result page.
#[derive(Debug, Clone)]
pub struct DrawPage {
    pub draw_number: u32,
    pub date: &'static str,
    pub numbers: [u8; 6],
    pub bonus: Option<u8>,
    pub winners: u32,
    pub amount: &'static str,
}

impl DrawPage {
    /// First draw of the lottery.
    pub fn first() -> Self {
        Self {
            draw_number: 1,
            date: "2002년 12월 07일",
            numbers: [10, 23, 29, 33, 37, 40],
            bonus: Some(16),
            winners: 4,
            amount: "2,067,000,000원",
        }
    }

    /// Generic page for `draw_number`.
    pub fn numbered(draw_number: u32) -> Self {
        Self {
            draw_number,
            date: "2003년 01월 04일",
            numbers: [1, 12, 23, 34, 40, 45],
            bonus: Some(9),
            winners: 2,
            amount: "1,500,000,000원",
        }
    }

    pub fn without_bonus(mut self) -> Self {
        self.bonus = None;
        self
    }
}

/// Render a result page in the markup the parser anchors on.
pub fn render_draw_page(page: &DrawPage) -> String {
    let balls: String = page
        .numbers
        .iter()
        .map(|n| format!(r#"<span class="ball_645 lrg">{n}</span>"#))
        .collect();
    let bonus = page
        .bonus
        .map(|b| {
            format!(
                r#"<div class="num bonus"><strong>보너스</strong><p><span class="ball_645 lrg">{b}</span></p></div>"#
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="ko">
<head><title>로또6/45 - 회차별 당첨번호</title></head>
<body>
<div class="win_result">
  <h4><strong>{draw}회</strong> 당첨결과</h4>
  <p class="desc">({date} 추첨)</p>
  <div class="nums">
    <div class="num win"><strong>당첨번호</strong><p>{balls}</p></div>
    {bonus}
  </div>
</div>
<table class="tbl_data tbl_data_col">
  <tbody>
    <tr><td>1등</td><td>-</td><td>{winners}</td><td>{amount}</td></tr>
    <tr><td>2등</td><td>-</td><td>30</td><td>50,000,000원</td></tr>
  </tbody>
</table>
</body>
</html>"#,
        draw = page.draw_number,
        date = page.date,
        winners = page.winners,
        amount = page.amount,
    )
}

/// Scripted upstream: per-draw outcome queues, "not drawn yet" for anything
/// without a script.
#[derive(Default)]
pub struct MockSite {
    scripts: Mutex<HashMap<u32, VecDeque<FetchOutcome>>>,
    pages: Mutex<HashMap<u32, String>>,
    calls: Mutex<Vec<u32>>,
}

impl MockSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `page` for its draw number on every request.
    pub fn page(&self, page: &DrawPage) {
        self.pages
            .lock()
            .unwrap()
            .insert(page.draw_number, render_draw_page(page));
    }

    /// Serve these outcomes first, in order, before falling back.
    pub fn script(&self, draw_number: u32, outcomes: Vec<FetchOutcome>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(draw_number, outcomes.into());
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, draw_number: u32) -> usize {
        self.calls().iter().filter(|&&n| n == draw_number).count()
    }
}

#[async_trait]
impl DrawSource for MockSite {
    async fn fetch_once(&self, draw_number: u32) -> FetchOutcome {
        self.calls.lock().unwrap().push(draw_number);

        if let Some(outcome) = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&draw_number)
            .and_then(VecDeque::pop_front)
        {
            return outcome;
        }
        match self.pages.lock().unwrap().get(&draw_number) {
            Some(body) => FetchOutcome::Success(body.clone()),
            None => FetchOutcome::FatalFailure(FatalFailure::NotYetDrawn),
        }
    }
}

/// Config without request spacing, so tests run without waiting.
pub fn fast_config(max_attempts: u32) -> FetchConfig {
    FetchConfig::builder()
        .request_delay(Duration::ZERO)
        .max_attempts(max_attempts)
        .backoff(Duration::from_millis(10), Duration::from_millis(40))
        .build()
}

pub fn fetcher(site: &Arc<MockSite>, max_attempts: u32) -> Fetcher<Arc<MockSite>> {
    Fetcher::new(site.clone(), &fast_config(max_attempts), CancellationToken::new())
}

pub fn transient() -> FetchOutcome {
    FetchOutcome::RetryableFailure("Server error: 503 Service Unavailable".into())
}
