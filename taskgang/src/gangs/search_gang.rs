// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context};
use bounded_queue::{make_queue, BoundedQueue, QueueError};
use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::config::GangConfig;
use crate::executor::Executor;
use crate::gang::{GangReport, TaskGang};

/// Where one word occurs in one input string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub cycle: u64,
    pub word: String,
    pub input: String,
    /// Byte offsets of every match, overlapping ones included.
    pub positions: Vec<usize>,
}

/// A fixed list of words, each compiled to a literal pattern.
#[derive(Debug, Clone)]
pub struct WordSearcher {
    patterns: Vec<(String, Regex)>,
}

impl WordSearcher {
    pub fn new<S: AsRef<str>>(words: &[S]) -> Result<Self, regex::Error> {
        let patterns = words
            .iter()
            .map(|word| {
                let word = word.as_ref();
                Regex::new(&regex::escape(word)).map(|pattern| (word.to_owned(), pattern))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// Start offsets of `pattern` in `input`. The search resumes one
    /// character after each match start, so "aa" occurs twice in "aaa".
    pub fn positions(pattern: &Regex, input: &str) -> Vec<usize> {
        let mut positions = Vec::new();
        let mut from = 0;
        while let Some(found) = pattern.find_at(input, from) {
            let start = found.start();
            positions.push(start);
            from = start + input[start..].chars().next().map_or(1, char::len_utf8);
            if from > input.len() {
                break;
            }
        }
        positions
    }

    /// One result per word that occurs in `input` at least once.
    pub fn search(&self, cycle: u64, input: &str) -> Vec<SearchResult> {
        self.patterns
            .iter()
            .filter_map(|(word, pattern)| {
                let positions = Self::positions(pattern, input);
                (!positions.is_empty()).then(|| SearchResult {
                    cycle,
                    word: word.clone(),
                    input: input.to_owned(),
                    positions,
                })
            })
            .collect()
    }
}

/// Search every batch for `words`. Workers hand their results to a consumer
/// thread through a bounded queue and block while it is full.
///
/// Results are returned ordered by cycle, input and word.
pub fn run_search<S: AsRef<str>>(
    config: &GangConfig,
    words: &[S],
    batches: Vec<Vec<String>>,
) -> anyhow::Result<(GangReport, Vec<SearchResult>)> {
    config.validate()?;
    let searcher = Arc::new(WordSearcher::new(words).context("invalid search word")?);
    let results: Arc<dyn BoundedQueue<SearchResult>> =
        make_queue(config.queue_kind.into(), config.queue_capacity)?;

    let consumer = {
        let results = results.clone();
        thread::Builder::new()
            .name("search-results".into())
            .spawn(move || {
                let mut collected = Vec::new();
                loop {
                    match results.take() {
                        Ok(result) => collected.push(result),
                        Err(QueueError::Closed) => break,
                        Err(e) => debug!("result consumer: {e}"),
                    }
                }
                collected
            })?
    };

    let executor: Arc<dyn Executor> = Arc::new(config.make_pool()?);
    let producer = results.clone();
    let mut gang = TaskGang::builder(executor)
        .batches(batches)
        .processor_with_context(move |input: &String, ctx| {
            for result in searcher.search(ctx.cycle, input) {
                producer.put(result)?;
            }
            Ok(())
        })
        .barrier(config.make_barrier()?)
        .advance(config.advance())
        .build()?;

    let outcome = gang.run();
    drop(gang);
    results.close();
    let mut collected = consumer
        .join()
        .map_err(|_| anyhow!("search result consumer panicked"))?;
    let report = outcome?;

    collected.sort_by(|a, b| {
        (a.cycle, &a.input, &a.word).cmp(&(b.cycle, &b.input, &b.word))
    });
    Ok((report, collected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(strings: &[&str]) -> Vec<String> {
        strings.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positions_include_overlapping_matches() {
        let pattern = Regex::new("aa").unwrap();
        assert_eq!(WordSearcher::positions(&pattern, "aaaa"), vec![0, 1, 2]);
        assert_eq!(WordSearcher::positions(&pattern, "abab"), Vec::<usize>::new());

        let pattern = Regex::new("ü").unwrap();
        assert_eq!(WordSearcher::positions(&pattern, "üxü"), vec![0, 3]);
    }

    #[test]
    fn test_words_are_literal() {
        let searcher = WordSearcher::new(&["a.c"]).unwrap();
        assert!(searcher.search(1, "abc").is_empty());
        assert_eq!(searcher.search(1, "xa.c")[0].positions, vec![1]);
    }

    #[test]
    fn test_search_across_cycles() {
        let config = GangConfig {
            workers: 3,
            queue_capacity: 2,
            ..GangConfig::default()
        };
        let batches = vec![
            batch(&["xreo", "reoxreo", "nothing"]),
            batch(&["nine", "ninenineteen"]),
        ];

        let (report, results) = run_search(&config, &["reo", "nine"], batches).unwrap();
        assert_eq!(report.cycles, 2);
        assert_eq!(report.processed, 5);
        assert_eq!(report.failed, 0);

        let summary: Vec<(u64, &str, &str, Vec<usize>)> = results
            .iter()
            .map(|r| (r.cycle, r.input.as_str(), r.word.as_str(), r.positions.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "reoxreo", "reo", vec![0, 4]),
                (1, "xreo", "reo", vec![1]),
                (2, "nine", "nine", vec![0]),
                (2, "ninenineteen", "nine", vec![0, 4]),
            ]
        );
    }
}
