//! Consume option parsing and planning.
//!
//! A consume request is written the way it would be typed after
//! `consume` on a stream consumer command line, e.g.
//! `events -p 1 --tail 10 -c ph:i=contact.ph`. Parsing it yields a
//! [`ConsumePlan`]: where to start, how many rows to take and which columns
//! to produce.

use clap::Parser;
use serde::Serialize;

use crate::column::ColumnSpec;
use crate::error::{Result, StreamLiteError};

#[derive(Debug, Parser)]
#[command(name = "consume", no_binary_name = true, disable_help_flag = true)]
pub struct ConsumeOpt {
    /// Topic name
    #[arg(value_name = "topic")]
    pub topic: String,

    /// Partition id
    #[arg(short = 'p', long, default_value_t = 0, value_name = "integer")]
    pub partition: u32,

    /// Consume records from all partitions
    #[arg(short = 'A', long = "all-partitions", conflicts_with = "partition")]
    pub all_partitions: bool,

    /// Keep waiting for new records once the end of the log is reached
    #[arg(short = 'd', long)]
    pub continuous: bool,

    /// Consume records from the beginning of the log
    #[arg(short = 'B', long, conflicts_with_all = ["head", "start", "tail"])]
    pub beginning: bool,

    /// Consume records starting <integer> from the beginning of the log
    #[arg(short = 'H', long, value_name = "integer", conflicts_with_all = ["beginning", "start", "tail"])]
    pub head: Option<u32>,

    /// Consume records starting <integer> from the end of the log
    #[arg(short = 'T', long, value_name = "integer", conflicts_with_all = ["beginning", "head", "start"])]
    pub tail: Option<u32>,

    /// The absolute offset of the first record to begin consuming from
    #[arg(long, value_name = "integer", conflicts_with_all = ["beginning", "head", "tail"])]
    pub start: Option<u32>,

    /// Consume records until end offset (inclusive)
    #[arg(long, value_name = "integer")]
    pub end: Option<u32>,

    /// Maximum number of rows returned to the query
    #[arg(long, default_value_t = 1000)]
    pub rows: u32,

    /// Maximum number of bytes to be retrieved per fetch
    #[arg(short = 'b', long = "maxbytes", value_name = "integer")]
    pub max_bytes: Option<i32>,

    /// Isolation level: read_committed or read_uncommitted
    #[arg(long, value_parser = parse_isolation)]
    pub isolation: Option<Isolation>,

    /// Column mapping `name[:type]=path` over JSON record values
    #[arg(short = 'c', long = "columns", value_parser = parse_column)]
    pub columns: Vec<ColumnSpec>,
}

/// Starting position in a partition log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "from", content = "value", rename_all = "snake_case")]
pub enum Offset {
    Beginning(u32),
    FromEnd(u32),
    Absolute(i64),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    ReadCommitted,
    ReadUncommitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionSelection {
    Single(u32),
    All,
}

/// Everything a consumer needs to serve one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumePlan {
    pub topic: String,
    pub partitions: PartitionSelection,
    pub offset: Offset,
    pub end: Option<u32>,
    pub rows: u32,
    pub max_bytes: Option<i32>,
    pub isolation: Option<Isolation>,
    pub continuous: bool,
    pub columns: Vec<ColumnSpec>,
}

impl ConsumeOpt {
    /// Parse a whitespace-separated option string.
    ///
    /// # Example
    ///
    /// ```
    /// use streamlite_core::consume::{ConsumeOpt, Offset};
    ///
    /// let opt = ConsumeOpt::parse_from_string("events --tail 5").unwrap();
    /// assert_eq!(opt.topic, "events");
    /// assert_eq!(opt.calculate_offset().unwrap(), Offset::FromEnd(5));
    /// ```
    pub fn parse_from_string(input: &str) -> Result<Self> {
        Ok(Self::try_parse_from(input.split_whitespace())?)
    }

    pub fn calculate_offset(&self) -> Result<Offset> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end < start {
                return Err(StreamLiteError::CrossingOffsets { start, end });
            }
        }

        let offset = if self.beginning {
            Offset::Beginning(0)
        } else if let Some(n) = self.head {
            Offset::Beginning(n)
        } else if let Some(n) = self.start {
            Offset::Absolute(i64::from(n))
        } else if let Some(n) = self.tail {
            Offset::FromEnd(n)
        } else {
            Offset::End
        };
        Ok(offset)
    }

    /// Declared columns, or the `offset`/`timestamp`/`value` defaults.
    pub fn column_specs(&self) -> Vec<ColumnSpec> {
        if self.columns.is_empty() {
            ColumnSpec::defaults()
        } else {
            self.columns.clone()
        }
    }

    pub fn plan(&self) -> Result<ConsumePlan> {
        let partitions = if self.all_partitions {
            PartitionSelection::All
        } else {
            PartitionSelection::Single(self.partition)
        };
        Ok(ConsumePlan {
            topic: self.topic.clone(),
            partitions,
            offset: self.calculate_offset()?,
            end: self.end,
            rows: self.rows,
            max_bytes: self.max_bytes,
            isolation: self.isolation,
            continuous: self.continuous,
            columns: self.column_specs(),
        })
    }
}

impl ConsumePlan {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse and plan in one step.
pub fn plan_from_string(input: &str) -> Result<ConsumePlan> {
    ConsumeOpt::parse_from_string(input)?.plan()
}

fn parse_column(s: &str) -> Result<ColumnSpec> {
    ColumnSpec::parse(s)
}

pub fn parse_isolation(s: &str) -> std::result::Result<Isolation, String> {
    match s {
        "read_committed" | "ReadCommitted" | "readCommitted" | "readcommitted" => {
            Ok(Isolation::ReadCommitted)
        }
        "read_uncommitted" | "ReadUncommitted" | "readUncommitted" | "readuncommitted" => {
            Ok(Isolation::ReadUncommitted)
        }
        _ => Err(format!(
            "unrecognized isolation: {s}. Supported: read_committed (ReadCommitted), read_uncommitted (ReadUncommitted)"
        )),
    }
}
