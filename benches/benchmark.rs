//! パフォーマンスベンチマーク
//!
//! このモジュールは、sheetjsonクレートの変換速度を測定するためのベンチマークを提供します。
//!
//! 実装するベンチマーク:
//! - メモリ上のシート（ヘッダー解析 + 行のバインド）
//! - rust_xlsxwriterで生成したワークブック（読み込みを含む全体）
//! - JSONエンコード

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_xlsxwriter::{Workbook, XlsxError};
use sheetjson::{
    Audience, ConverterBuilder, FieldDescriptor, FieldKind, JsonEncoder, JsonStyle, MemorySheet,
    RecordSchema, ScalarType,
};
use std::io::Cursor;

const ROWS: usize = 10_000;

fn monster_schema() -> RecordSchema {
    let stats = RecordSchema::new("Stats")
        .field(FieldDescriptor::scalar("hp", ScalarType::Int))
        .field(FieldDescriptor::scalar("speed", ScalarType::Float));
    RecordSchema::new("Monster")
        .field(FieldDescriptor::required("Id", ScalarType::UInt))
        .field(FieldDescriptor::scalar("Name", ScalarType::String))
        .field(FieldDescriptor::record("Stats", stats))
        .field(FieldDescriptor::array(
            "Drops",
            FieldKind::optional(ScalarType::UShort),
            3,
        ))
        .field(FieldDescriptor::scalar("Boss", ScalarType::Bool))
}

/// ベンチマーク用の表（ヘッダー + `rows`行 + `EOR`）
fn table_rows(rows: usize) -> Vec<Vec<String>> {
    let header: [&[&str]; 4] = [
        &["#", "", "", "", "", "", "", "", "", "EOC"],
        &["Id", "Name", "Stats", "Stats.speed", "Drops", "", "", "Boss", "Memo"],
        &["UINT", "STRING", "INT", "FLOAT", "USHORT", "USHORT", "USHORT", "BOOL", "STRING"],
        &["A", "A", "A", "A", "A", "A", "A", "A", "S"],
    ];
    let mut table: Vec<Vec<String>> = header
        .iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect();

    for i in 0..rows {
        table.push(vec![
            (i + 1).to_string(),
            format!("Monster{}", i),
            (i % 500).to_string(),
            format!("{}.5", i % 10),
            (i % 7).to_string(),
            String::new(),
            (i % 3).to_string(),
            if i % 100 == 0 { "TRUE" } else { "FALSE" }.to_string(),
            format!("memo {}", i),
        ]);
    }
    table.push(vec!["EOR".to_string()]);
    table
}

/// 同じ表をxlsxとして書き出す
fn generate_workbook(rows: usize) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (row, cells) in table_rows(rows).iter().enumerate() {
        for (col, text) in cells.iter().enumerate() {
            if !text.is_empty() {
                worksheet.write_string(row as u32, col as u16, text)?;
            }
        }
    }
    workbook.save_to_buffer()
}

fn benchmark_memory_sheet(c: &mut Criterion) {
    let table = table_rows(ROWS);
    let schema = monster_schema();
    let converter = ConverterBuilder::new().build().unwrap();

    let mut group = c.benchmark_group("memory_sheet");
    group.throughput(Throughput::Elements(ROWS as u64));

    for audience in Audience::ALL {
        group.bench_function(format!("bind_{}_rows_{}", ROWS, audience.dir_name()), |b| {
            b.iter(|| {
                let sheet = MemorySheet::from_texts(black_box(&table));
                let records = converter.convert_rows(sheet, &schema, audience).unwrap();
                black_box(records)
            });
        });
    }

    group.finish();
}

fn benchmark_workbook(c: &mut Criterion) {
    let data = generate_workbook(ROWS).unwrap();
    let schema = monster_schema();
    let converter = ConverterBuilder::new().build().unwrap();

    let mut group = c.benchmark_group("workbook");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(10);

    group.bench_function("convert_xlsx", |b| {
        b.iter(|| {
            let input = Cursor::new(black_box(&data));
            black_box(converter.convert(input, &schema).unwrap())
        });
    });

    group.finish();
}

fn benchmark_encode(c: &mut Criterion) {
    let converter = ConverterBuilder::new().build().unwrap();
    let records = converter
        .convert_rows(
            MemorySheet::from_texts(&table_rows(ROWS)),
            &monster_schema(),
            Audience::Server,
        )
        .unwrap();

    let mut group = c.benchmark_group("encode");
    for style in [JsonStyle::Compact, JsonStyle::Pretty] {
        let encoder = JsonEncoder::from_style(style);
        group.bench_function(format!("{:?}", style), |b| {
            b.iter(|| black_box(encoder.encode(black_box(&records)).unwrap()));
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(std::time::Duration::from_secs(10))
        .warm_up_time(std::time::Duration::from_secs(3));
    targets = benchmark_memory_sheet, benchmark_workbook, benchmark_encode
}

criterion_main!(benches);
