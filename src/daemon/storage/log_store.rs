use std::{
    collections::BTreeMap,
    future::Future,
    io::{ErrorKind, SeekFrom},
    ops::{Deref, RangeInclusive},
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, error, warn};

use crate::fs::operations::seek_last_line;

use super::entities::DailyRecord;

/// Interface for abstracting storage of the daily log.
pub trait LogStore {
    /// Writes records in order. A record for the same day as the last stored record replaces it,
    /// any other record is appended. Earlier days can't be corrected once a later one is written.
    fn upsert_days(&self, records: Vec<DailyRecord>) -> impl Future<Output = Result<()>>;

    /// Every readable record in file order. A missing log is an empty history.
    fn read_all(&self) -> impl Future<Output = Result<Vec<DailyRecord>>>;

    fn upsert_day(&self, record: DailyRecord) -> impl Future<Output = Result<()>> {
        self.upsert_days(vec![record])
    }

    /// Counts per day for a range of days. Later lines win should a day be present twice.
    /// Unreadable logs are reported and treated as empty.
    fn read_range(
        &self,
        range: RangeInclusive<NaiveDate>,
    ) -> impl Future<Output = BTreeMap<NaiveDate, u64>> {
        async move {
            self.read_all_or_empty()
                .await
                .into_iter()
                .filter(|record| range.contains(&record.date))
                .map(|record| (record.date, record.count))
                .collect()
        }
    }

    fn read_year(&self, year: i32) -> impl Future<Output = BTreeMap<NaiveDate, u64>> {
        async move {
            self.read_all_or_empty()
                .await
                .into_iter()
                .filter(|record| record.date.year() == year)
                .map(|record| (record.date, record.count))
                .collect()
        }
    }

    /// Smallest and largest year present in the log.
    fn year_range(&self) -> impl Future<Output = Option<(i32, i32)>> {
        async move {
            self.read_all_or_empty()
                .await
                .into_iter()
                .map(|record| record.date.year())
                .fold(None, |range, year| match range {
                    None => Some((year, year)),
                    Some((min, max)) => Some((i32::min(min, year), i32::max(max, year))),
                })
        }
    }

    fn read_all_or_empty(&self) -> impl Future<Output = Vec<DailyRecord>> {
        async move {
            self.read_all()
                .await
                .inspect_err(|e| error!("Failed to read the daily log {e:?}"))
                .unwrap_or_default()
        }
    }
}

impl<T: Deref> LogStore for T
where
    T::Target: LogStore,
{
    fn upsert_days(&self, records: Vec<DailyRecord>) -> impl Future<Output = Result<()>> {
        self.deref().upsert_days(records)
    }

    fn read_all(&self) -> impl Future<Output = Result<Vec<DailyRecord>>> {
        self.deref().read_all()
    }
}

/// The main realization of [LogStore]. Keeps one `YYYY-MM-DD,count` line per day in a plain text
/// file.
pub struct CsvLogStore {
    path: PathBuf,
}

impl CsvLogStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all_inner(&self) -> Result<Vec<DailyRecord>, std::io::Error> {
        debug!("Reading {:?}", self.path);
        let file = File::open(&self.path).await?;
        file.lock_shared()?;
        // Lines are read as bytes, so a line with broken encoding is skipped like any other
        // malformed line.
        let mut reader = BufReader::new(file);
        let mut records = vec![];
        let mut line = Vec::new();
        let mut line_number = 0usize;
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    reader.into_inner().unlock_async().await?;
                    return Err(e);
                }
            }
            line_number += 1;
            match parse_line(&line) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                // A broken line doesn't invalidate the rest of the history.
                Err(e) => warn!("Skipping line {line_number} of {:?}: {e}", self.path),
            }
        }

        reader.into_inner().unlock_async().await?;
        Ok(records)
    }

    async fn upsert_with_file(file: &mut File, records: Vec<DailyRecord>) -> Result<()> {
        // 1. Find the last line of the log.
        // 2. Merge it with the new records.
        // 3. Overwrite it with the merged records.
        let end = file.seek(SeekFrom::End(0)).await?;
        let line_start = seek_last_line(file, &mut vec![0; 1024]).await?;
        let mut last_line = Vec::new();
        file.read_to_end(&mut last_line).await?;

        let terminated = last_line.ends_with(b"\n");
        let (write_from, last_record) = match (parse_line(&last_line), terminated) {
            (Ok(record), _) => (line_start, record),
            (Err(e), false) => {
                // Usually a write cut short by a shutdown.
                let tail = String::from_utf8_lossy(&last_line);
                warn!("Dropping unterminated tail {tail:?}: {e}");
                (line_start, None)
            }
            (Err(e), true) => {
                warn!("Last record is malformed, appending after it: {e}");
                (end, None)
            }
        };

        let mut buffer = String::new();
        for record in merge_records(last_record, records) {
            buffer.push_str(&record.to_line());
        }

        // Cut first, a crash mid-write then leaves an unterminated tail that the next upsert
        // replaces.
        file.set_len(write_from).await?;
        file.seek(SeekFrom::Start(write_from)).await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}

impl LogStore for CsvLogStore {
    async fn upsert_days(&self, records: Vec<DailyRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::upsert_with_file(&mut file, records).await;
        file.unlock_async().await?;
        result
    }

    async fn read_all(&self) -> Result<Vec<DailyRecord>> {
        match self.read_all_inner().await {
            Ok(records) => Ok(records),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }
}

/// Parses one raw line of the log. Blank lines are not records.
fn parse_line(line: &[u8]) -> Result<Option<DailyRecord>> {
    let line = std::str::from_utf8(line)?;
    if line.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(line.parse()?))
}

/// Folds new records onto the last stored one, keeping a single record per consecutive day.
fn merge_records(
    last_record: Option<DailyRecord>,
    records: impl IntoIterator<Item = DailyRecord>,
) -> Vec<DailyRecord> {
    let mut merged = Vec::from_iter(last_record);
    for record in records {
        match merged.last_mut() {
            Some(last) if last.date == record.date => last.count = record.count,
            Some(_) | None => merged.push(record),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::{tempdir, TempDir};

    use super::{merge_records, CsvLogStore, LogStore};
    use crate::daemon::storage::entities::DailyRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store_in(dir: &TempDir) -> CsvLogStore {
        CsvLogStore::new(dir.path().join("log.csv"))
    }

    fn store_with(dir: &TempDir, content: impl AsRef<[u8]>) -> Result<CsvLogStore> {
        let store = store_in(dir);
        std::fs::write(store.path(), content)?;
        Ok(store)
    }

    fn contents(store: &CsvLogStore) -> Vec<u8> {
        std::fs::read(store.path()).unwrap()
    }

    fn text(store: &CsvLogStore) -> String {
        std::fs::read_to_string(store.path()).unwrap()
    }

    #[tokio::test]
    async fn test_same_day_is_merged() -> Result<()> {
        let dir = tempdir()?;
        let store = store_in(&dir);

        store.upsert_day(DailyRecord::new(date(2024, 6, 1), 50)).await?;
        store.upsert_day(DailyRecord::new(date(2024, 6, 1), 75)).await?;

        assert_eq!(text(&store), "2024-06-01,75\n");
        assert_eq!(
            store.read_all().await?,
            vec![DailyRecord::new(date(2024, 6, 1), 75)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_new_day_is_appended() -> Result<()> {
        let dir = tempdir()?;
        let store = store_in(&dir);

        store.upsert_day(DailyRecord::new(date(2024, 6, 1), 1200)).await?;
        store.upsert_day(DailyRecord::new(date(2024, 6, 2), 3)).await?;
        store.upsert_day(DailyRecord::new(date(2024, 6, 2), 4)).await?;

        assert_eq!(text(&store), "2024-06-01,1200\n2024-06-02,4\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_shorter_count_truncates_old_tail() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(&dir, "2024-06-01,10\n2024-06-02,123456\n")?;

        store.upsert_day(DailyRecord::new(date(2024, 6, 2), 7)).await?;

        assert_eq!(text(&store), "2024-06-01,10\n2024-06-02,7\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_earlier_days_are_not_corrected() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(&dir, "2024-06-01,10\n2024-06-02,20\n")?;

        store.upsert_day(DailyRecord::new(date(2024, 6, 1), 99)).await?;

        assert_eq!(text(&store), "2024-06-01,10\n2024-06-02,20\n2024-06-01,99\n");
        // The later write wins when reading.
        assert_eq!(store.read_year(2024).await[&date(2024, 6, 1)], 99);
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_upsert_merges_with_tail() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(&dir, "2024-06-01,10\n")?;

        store
            .upsert_days(vec![
                DailyRecord::new(date(2024, 6, 1), 15),
                DailyRecord::new(date(2024, 6, 2), 0),
                DailyRecord::new(date(2024, 6, 3), 0),
            ])
            .await?;

        assert_eq!(text(&store), "2024-06-01,15\n2024-06-02,0\n2024-06-03,0\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_replaced() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(&dir, "2024-06-01,10\n2024-06-0")?;

        store.upsert_day(DailyRecord::new(date(2024, 6, 2), 5)).await?;

        assert_eq!(text(&store), "2024-06-01,10\n2024-06-02,5\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_terminated_tail_is_kept() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(&dir, "2024-06-01,10\ngarbage\n")?;

        store.upsert_day(DailyRecord::new(date(2024, 6, 2), 5)).await?;

        assert_eq!(text(&store), "2024-06-01,10\ngarbage\n2024-06-02,5\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_undecodable_terminated_tail_is_kept() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(&dir, b"2024-06-01,10\n\xff\xfe\n")?;

        store.upsert_day(DailyRecord::new(date(2024, 6, 2), 5)).await?;

        assert_eq!(contents(&store), b"2024-06-01,10\n\xff\xfe\n2024-06-02,5\n");
        assert_eq!(
            store.read_all().await?,
            vec![
                DailyRecord::new(date(2024, 6, 1), 10),
                DailyRecord::new(date(2024, 6, 2), 5),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_undecodable_unterminated_tail_is_replaced() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(&dir, b"2024-06-01,10\n2024-\xff")?;

        store.upsert_day(DailyRecord::new(date(2024, 6, 2), 5)).await?;

        assert_eq!(text(&store), "2024-06-01,10\n2024-06-02,5\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_rewrite_leaves_no_stale_bytes() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(&dir, "2024-06-01,10\n2024-06-02,99999999999\n")?;

        store.upsert_day(DailyRecord::new(date(2024, 6, 2), 1)).await?;
        store.upsert_day(DailyRecord::new(date(2024, 6, 2), 22)).await?;

        let expected = "2024-06-01,10\n2024-06-02,22\n";
        assert_eq!(std::fs::metadata(store.path())?.len(), expected.len() as u64);
        assert_eq!(text(&store), expected);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_history() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvLogStore::new(dir.path().join("nested/log.csv"));

        assert!(store.read_all().await?.is_empty());
        assert!(store.read_year(2024).await.is_empty());
        assert_eq!(store.year_range().await, None);

        store.upsert_day(DailyRecord::new(date(2024, 6, 1), 1)).await?;
        assert_eq!(store.year_range().await, Some((2024, 2024)));
        Ok(())
    }

    #[tokio::test]
    async fn test_read_year_filters_other_years() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(
            &dir,
            "2023-12-30,5\n2023-12-31,6\n2024-01-01,7\n2024-01-02,8\n",
        )?;

        let year = store.read_year(2024).await;

        assert_eq!(
            year,
            BTreeMap::from([(date(2024, 1, 1), 7), (date(2024, 1, 2), 8)])
        );
        assert_eq!(store.year_range().await, Some((2023, 2024)));
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() -> Result<()> {
        let dir = tempdir()?;
        let clean = store_with(&dir, "2024-06-01,10\n2024-06-02,20\n2024-06-03,30\n")?;
        let clean_records = clean.read_all().await?;

        let dirty_dir = tempdir()?;
        let dirty = store_with(
            &dirty_dir,
            "2024-06-01,10\n2024-06-02,20\n2024-06-0x,??\n2024-06-03,30\n",
        )?;

        assert_eq!(dirty.read_all().await?, clean_records);
        assert_eq!(dirty.read_year(2024).await, clean.read_year(2024).await);
        assert_eq!(dirty.year_range().await, clean.year_range().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_undecodable_line_is_skipped() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(&dir, b"2024-06-01,10\n\xff\xfe,3\n2024-06-03,30\n")?;

        assert_eq!(
            store.read_all().await?,
            vec![
                DailyRecord::new(date(2024, 6, 1), 10),
                DailyRecord::new(date(2024, 6, 3), 30),
            ]
        );
        assert_eq!(store.year_range().await, Some((2024, 2024)));
        Ok(())
    }

    #[tokio::test]
    async fn test_read_range_is_inclusive() -> Result<()> {
        let dir = tempdir()?;
        let store = store_with(&dir, "2024-06-01,1\n2024-06-02,2\n2024-06-03,3\n2024-06-04,4\n")?;

        let range = store.read_range(date(2024, 6, 2)..=date(2024, 6, 3)).await;

        assert_eq!(
            range,
            BTreeMap::from([(date(2024, 6, 2), 2), (date(2024, 6, 3), 3)])
        );
        Ok(())
    }

    #[test]
    fn test_merge_records() {
        let merged = merge_records(
            Some(DailyRecord::new(date(2024, 6, 1), 1)),
            [
                DailyRecord::new(date(2024, 6, 1), 2),
                DailyRecord::new(date(2024, 6, 2), 3),
                DailyRecord::new(date(2024, 6, 2), 4),
            ],
        );

        assert_eq!(
            merged,
            vec![
                DailyRecord::new(date(2024, 6, 1), 2),
                DailyRecord::new(date(2024, 6, 2), 4),
            ]
        );
    }
}
