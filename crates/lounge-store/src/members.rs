//! CSV-backed member directory

use csv::ByteRecord;
use lounge_api::Member;
use lounge_util::MemberId;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

use crate::file::{read_optional, write_atomic};
use crate::traits::matches_query;
use crate::{MemberDirectory, StoreResult};

/// Columns used when the file has no recognizable header row
const FALLBACK_COLUMNS: Columns = Columns {
    name: 2,
    identity: 3,
    has_header: false,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    name: usize,
    identity: usize,
    has_header: bool,
}

impl Columns {
    /// Locate the name and identity columns from the first row
    fn detect(first_row: &ByteRecord) -> Self {
        let mut name = None;
        let mut identity = None;
        for (i, field) in first_row.iter().enumerate() {
            match String::from_utf8_lossy(field).trim().to_lowercase().as_str() {
                "name" | "student name" => name = Some(i),
                "id" | "student id" | "student number" => identity = Some(i),
                _ => {}
            }
        }

        match (name, identity) {
            (Some(name), Some(identity)) => Self {
                name,
                identity,
                has_header: true,
            },
            _ => FALLBACK_COLUMNS,
        }
    }

    fn width(&self) -> usize {
        self.name.max(self.identity) + 1
    }
}

#[derive(Debug)]
struct Loaded {
    columns: Columns,
    members: Vec<Member>,
}

/// Member directory read from a CSV file.
///
/// The whole file is parsed on `reload`; enrollment rewrites the file with
/// one extra row.
#[derive(Debug)]
pub struct CsvMemberDirectory {
    path: PathBuf,
    state: RwLock<Loaded>,
}

impl CsvMemberDirectory {
    /// Open the directory and read it once. An absent file is an empty
    /// directory.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = Self::unloaded(path);
        let count = dir.reload()?;
        info!(path = %dir.path.display(), members = count, "Member directory loaded");
        Ok(dir)
    }

    /// Empty directory for `path` that has not read the file yet
    pub fn unloaded(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(Loaded {
                columns: FALLBACK_COLUMNS,
                members: Vec::new(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw rows. Fields are kept as bytes so exports in other encodings
    /// survive a rewrite untouched.
    fn read_rows(&self) -> StoreResult<Vec<ByteRecord>> {
        let Some(bytes) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            rows.push(record?);
        }
        Ok(rows)
    }
}

/// Field `index` of `row` as text; bytes that are not UTF-8 are replaced
fn text_field(row: &ByteRecord, index: usize) -> Option<String> {
    let field = String::from_utf8_lossy(row.get(index)?);
    Some(field.trim().to_string())
}

fn parse_members(rows: &[ByteRecord]) -> Loaded {
    let Some(first) = rows.first() else {
        return Loaded {
            columns: FALLBACK_COLUMNS,
            members: Vec::new(),
        };
    };

    let columns = Columns::detect(first);
    let data = if columns.has_header { &rows[1..] } else { rows };

    let members = data
        .iter()
        .filter_map(|row| {
            let name = text_field(row, columns.name)?;
            let identity = text_field(row, columns.identity)?;
            if name.is_empty() || identity.is_empty() {
                return None;
            }
            Some(Member {
                name,
                identity: MemberId::new(identity),
            })
        })
        .collect();

    Loaded { columns, members }
}

impl MemberDirectory for CsvMemberDirectory {
    fn lookup(&self, identity: &MemberId) -> Option<Member> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .members
            .iter()
            .find(|m| &m.identity == identity)
            .cloned()
    }

    fn search(&self, query: &str) -> Vec<Member> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .members
            .iter()
            .filter(|m| matches_query(m, query))
            .cloned()
            .collect()
    }

    fn enroll(&self, member: Member) -> StoreResult<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let rows = self.read_rows()?;
        let columns = match rows.first() {
            Some(first) => Columns::detect(first),
            None => FALLBACK_COLUMNS,
        };

        let mut new_row = vec![""; columns.width()];
        new_row[columns.name] = member.name.as_str();
        new_row[columns.identity] = member.identity.as_str();

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.write_record(&new_row)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        write_atomic(&self.path, &bytes)?;
        debug!(identity = %member.identity, "Member enrolled");

        state.columns = columns;
        state.members.push(member);
        Ok(())
    }

    fn reload(&self) -> StoreResult<usize> {
        let rows = self.read_rows()?;
        let loaded = parse_members(&rows);
        let count = loaded.members.len();

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = loaded;
        Ok(count)
    }

    fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .members
            .len()
    }
}
