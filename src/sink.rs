use crate::{
    record::{Field, GameRecord},
    CrawlerError, Sink,
};
use std::{fs::File, io::Write, path::Path, sync::Mutex};

/// Writes admitted records as CSV rows, header first, in `columns` order.
pub struct CsvSink<W: Write> {
    columns: Vec<Field>,
    writer: Mutex<csv::Writer<W>>,
}

impl CsvSink<File> {
    pub fn create<P: AsRef<Path>>(path: P, columns: Vec<Field>) -> Result<Self, CrawlerError> {
        let file = File::create(path)?;
        CsvSink::from_writer(file, columns)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(inner: W, columns: Vec<Field>) -> Result<Self, CrawlerError> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(columns.iter().map(|c| c.column_name()))?;
        Ok(CsvSink {
            columns,
            writer: Mutex::new(writer),
        })
    }

    pub fn write_record(&self, record: &GameRecord) -> Result<(), CrawlerError> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_record(record.row(&self.columns))?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), CrawlerError> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, CrawlerError> {
        let writer = self.writer.into_inner().unwrap_or_else(|e| e.into_inner());
        writer.into_inner().map_err(|e| e.into_error().into())
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> Sink for CsvSink<W> {
    async fn write(&self, record: GameRecord) -> Result<(), CrawlerError> {
        self.write_record(&record)
    }

    async fn finish(&self) -> Result<(), CrawlerError> {
        self.flush()
    }
}

#[async_trait::async_trait]
impl Sink for Vec<Box<dyn Sink + Send + Sync>> {
    async fn write(&self, record: GameRecord) -> Result<(), CrawlerError> {
        for sink in self {
            sink.write(record.clone()).await?;
        }
        Ok(())
    }

    async fn finish(&self) -> Result<(), CrawlerError> {
        for sink in self {
            sink.finish().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_csv_columns_and_quoting() {
        let sink = CsvSink::from_writer(vec![], vec![Field::Name, Field::Blockchain, Field::P2e])
            .unwrap();
        sink.write(GameRecord {
            name: "Axie Infinity".to_string(),
            blockchain: "Ethereum, Ronin".to_string(),
            p2e: "None".to_string(),
            status: "Live".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        sink.finish().await.unwrap();

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(
            out,
            "Name,Blockchain,P2E\nAxie Infinity,\"Ethereum, Ronin\",None\n"
        );
    }
}
