//! The in-memory tabular dataset, as parsed from a delimited file.

use crate::{Columns, Element};

/// An ordered sequence of rows sharing one header row.
///
/// Cells are kept verbatim alongside their typed [Element] view, so that writing a [Dataset] back
/// out produces exactly what was read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    headers: csv::StringRecord,
    columns: Columns,
    records: Vec<Record>,
}

/// A single row of a [Dataset].
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    raw: csv::StringRecord,
    element: Element,
}

impl Dataset {
    /// The CSV reader configuration shared by the loader and the tests.
    pub fn configured_csv_reader_builder() -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(true);
        builder
    }

    /// Parse a whole CSV stream, header row first.
    pub fn from_csv<R: std::io::Read>(reader: &mut csv::Reader<R>) -> csv::Result<Self> {
        let headers = reader.headers()?.clone();
        let typed_headers = deduplicated(&headers);
        let records = reader
            .records()
            .map(|raw| {
                let raw = raw?;
                let element = Element::from_record(&raw, &typed_headers)?;
                Ok(Record { raw, element })
            })
            .collect::<csv::Result<Vec<_>>>()?;
        Ok(Self {
            columns: Columns::from_headers(&headers),
            headers,
            records,
        })
    }

    /// Serialize a [Dataset] to CSV, headers first, cells untouched.
    pub fn dump_csv<W: std::io::Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        if self.headers.is_empty() {
            return Ok(());
        }
        writer.write_record(&self.headers)?;
        for record in &self.records {
            writer.write_record(&record.raw)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Serialize a [Dataset] to an in-memory CSV document.
    pub fn to_csv_bytes(&self) -> csv::Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(vec![]);
        self.dump_csv(&mut writer)?;
        writer
            .into_inner()
            .map_err(|err| csv::Error::from(err.into_error()))
    }

    /// A dataset with the same headers, keeping only the records accepted by `keep`, in order.
    pub fn retain<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Record) -> bool,
    {
        Self {
            headers: self.headers.clone(),
            columns: self.columns,
            records: self
                .records
                .iter()
                .filter(|record| keep(*record))
                .cloned()
                .collect(),
        }
    }

    pub fn headers(&self) -> &csv::StringRecord {
        &self.headers
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.records.iter().map(Record::element)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Rename repeated header names to `name.1`, `name.2`... so that only the first occurrence of a
/// column feeds the typed [Element] view, matching [Columns::from_headers].
fn deduplicated(headers: &csv::StringRecord) -> csv::StringRecord {
    let mut seen = std::collections::HashSet::new();
    headers
        .iter()
        .map(|name| {
            let mut unique = name.to_owned();
            let mut suffix = 0;
            while !seen.insert(unique.clone()) {
                suffix += 1;
                unique = format!("{}.{}", name, suffix);
            }
            unique
        })
        .collect()
}

impl Record {
    /// The raw cell at the given column index, if any.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.raw.get(index)
    }

    pub fn raw(&self) -> &csv::StringRecord {
        &self.raw
    }

    pub fn element(&self) -> &Element {
        &self.element
    }
}
