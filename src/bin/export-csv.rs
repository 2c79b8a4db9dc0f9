use playtoearn_crawler::playtoearn::PlayToEarnData;
use playtoearn_crawler::sink::CsvSink;
use playtoearn_crawler::{Field, Table};

// Usage: export-csv <NAME> <OUTPUT.csv> [COLUMNS]
async fn export_csv() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let name = args.next().unwrap_or_else(|| "playtoearn".to_string());
    let output = args.next().unwrap_or_else(|| format!("{}.csv", name));
    let columns = match args.next() {
        Some(columns) => columns
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<Field>, _>>()?,
        None => Field::ALL.to_vec(),
    };

    let p = PlayToEarnData::new(&name).await?;
    let sink = CsvSink::create(&output, columns)?;
    let mut i = 0;
    for game in p.games.all().await? {
        sink.write_record(&game)?;
        i += 1;
    }
    sink.flush()?;
    println!("Exported {} games to {}", i, output);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    export_csv().await
}
