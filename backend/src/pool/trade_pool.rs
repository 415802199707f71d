use std::collections::VecDeque;
use std::sync::Arc;

use corelib::AggTrade;

use super::BATCH;

/// Ordered trade buffer owned by exactly one keeper.
///
/// Trades are stored in immutable, reference-counted chunks. Publishing a
/// snapshot clones chunk handles only; the keeper replaces chunks instead of
/// mutating them, so every snapshot stays valid after the pool moves on.
///
/// Invariants: ids strictly ascending, times weakly ascending, no empty
/// chunk, `head` < length of the front chunk whenever the pool is non-empty.
#[derive(Debug, Default)]
pub struct TradePool {
    chunks: VecDeque<Arc<[AggTrade]>>,
    head: usize,
    len: usize,
}

impl TradePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from trades already ordered by id.
    pub fn from_batch(batch: Vec<AggTrade>) -> Self {
        let mut pool = Self::new();
        pool.append(batch);
        pool
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<&AggTrade> {
        self.chunks.front().map(|c| &c[self.head])
    }

    pub fn last(&self) -> Option<&AggTrade> {
        self.chunks.back().and_then(|c| c.last())
    }

    pub fn get(&self, index: usize) -> Option<&AggTrade> {
        lookup(&self.chunks, self.head, self.len, index)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &AggTrade> + '_ {
        visible(&self.chunks, self.head).flatten()
    }

    /// Insert older trades in front. Only trades with an id below the current
    /// first id are kept. Returns how many were inserted.
    pub fn prepend(&mut self, batch: Vec<AggTrade>) -> usize {
        let batch: Vec<AggTrade> = match self.first().map(|t| t.id) {
            Some(first_id) => batch.into_iter().filter(|t| t.id < first_id).collect(),
            None => batch,
        };
        let batch = ascending_run(batch);
        if batch.is_empty() {
            return 0;
        }

        if self.head > 0 {
            // the hidden prefix belongs to the front chunk only
            if let Some(front) = self.chunks.pop_front() {
                self.chunks.push_front(Arc::from(&front[self.head..]));
            }
            self.head = 0;
        }

        let added = batch.len();
        self.chunks.push_front(Arc::from(batch));
        self.len += added;
        added
    }

    /// Append newer trades. Only trades with an id above the current last id
    /// are kept. Small batches are merged into the tail chunk until it holds
    /// `BATCH` trades. Returns how many were appended.
    pub fn append(&mut self, batch: Vec<AggTrade>) -> usize {
        let batch: Vec<AggTrade> = match self.last().map(|t| t.id) {
            Some(last_id) => batch.into_iter().filter(|t| t.id > last_id).collect(),
            None => batch,
        };
        let batch = ascending_run(batch);
        if batch.is_empty() {
            return 0;
        }

        let added = batch.len();
        let tail_is_front = self.chunks.len() == 1;
        let tail_visible = match self.chunks.back() {
            Some(back) if tail_is_front => back.len() - self.head,
            Some(back) => back.len(),
            None => usize::MAX,
        };

        if tail_visible < BATCH {
            if let Some(back) = self.chunks.pop_back() {
                let start = if tail_is_front { self.head } else { 0 };
                let mut merged = Vec::with_capacity(back.len() - start + added);
                merged.extend_from_slice(&back[start..]);
                merged.extend(batch);
                if tail_is_front {
                    self.head = 0;
                }
                self.chunks.push_back(Arc::from(merged));
            }
        } else {
            self.chunks.push_back(Arc::from(batch));
        }

        self.len += added;
        added
    }

    /// Drop every trade strictly older than `cutoff_ms`. Returns how many
    /// were dropped.
    pub fn evict_older_than(&mut self, cutoff_ms: i64) -> usize {
        let mut removed = 0;

        while let Some(front) = self.chunks.front() {
            let slice = &front[self.head..];
            let newest = slice.last().map(|t| t.time_ms).unwrap_or(i64::MIN);

            if newest < cutoff_ms {
                removed += slice.len();
                self.chunks.pop_front();
                self.head = 0;
                continue;
            }

            let k = slice.partition_point(|t| t.time_ms < cutoff_ms);
            self.head += k;
            removed += k;
            break;
        }

        self.len -= removed;
        removed
    }

    /// Immutable view of the pool as it stands now.
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            chunks: self.chunks.iter().cloned().collect::<Vec<_>>().into(),
            head: self.head,
            len: self.len,
        }
    }

    #[cfg(test)]
    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Read-only, cheaply clonable view of a `TradePool` at publication time.
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    chunks: Arc<[Arc<[AggTrade]>]>,
    head: usize,
    len: usize,
}

impl PoolSnapshot {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<&AggTrade> {
        self.chunks.first().map(|c| &c[self.head])
    }

    pub fn last(&self) -> Option<&AggTrade> {
        self.chunks.last().and_then(|c| c.last())
    }

    pub fn get(&self, index: usize) -> Option<&AggTrade> {
        lookup(self.chunks.iter(), self.head, self.len, index)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &AggTrade> + '_ {
        visible(self.chunks.iter(), self.head).flatten()
    }

    /// Contiguous copy, e.g. for the statistics engine.
    pub fn to_vec(&self) -> Vec<AggTrade> {
        let mut out = Vec::with_capacity(self.len);
        out.extend(self.iter().cloned());
        out
    }
}

fn visible<'a, I>(chunks: I, head: usize) -> impl DoubleEndedIterator<Item = &'a [AggTrade]>
where
    I: IntoIterator<Item = &'a Arc<[AggTrade]>>,
    I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
{
    chunks
        .into_iter()
        .enumerate()
        .map(move |(i, c)| if i == 0 { &c[head..] } else { &c[..] })
}

fn lookup<'a, I>(chunks: I, head: usize, len: usize, index: usize) -> Option<&'a AggTrade>
where
    I: IntoIterator<Item = &'a Arc<[AggTrade]>>,
    I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
{
    if index >= len {
        return None;
    }

    // walk from whichever end is closer
    if index >= len / 2 {
        let mut from_back = len - 1 - index;
        for slice in visible(chunks, head).rev() {
            if from_back < slice.len() {
                return slice.get(slice.len() - 1 - from_back);
            }
            from_back -= slice.len();
        }
    } else {
        let mut rem = index;
        for slice in visible(chunks, head) {
            if rem < slice.len() {
                return slice.get(rem);
            }
            rem -= slice.len();
        }
    }
    None
}

/// Keep the leading strictly-ascending run of ids; the exchange returns
/// batches ascending, anything else is discarded.
fn ascending_run(mut batch: Vec<AggTrade>) -> Vec<AggTrade> {
    let cut = batch
        .windows(2)
        .position(|w| w[1].id <= w[0].id)
        .map(|p| p + 1)
        .unwrap_or(batch.len());
    batch.truncate(cut);
    batch
}
