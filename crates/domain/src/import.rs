//! Bulk product import from CSV.
//!
//! Expected header: `shop_name, nomenclature_name, name_ru, name_kz, price,
//! quantity`, optionally followed by `spec_name_N` / `spec_value_N` pairs.
//! Every row is written in its own unit of work; a bad row is reported and
//! skipped without affecting the others.

use std::collections::HashMap;
use std::io::Read;

use common::{CompanyId, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storage::{NewProduct, ProductSpec, Store, UnitOfWork};
use thiserror::Error;

use crate::error::DomainError;

const NAME_MAX: usize = 255;

/// Errors that abort an import as a whole.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The file has no header row.
    #[error("Invalid CSV file or empty file")]
    Empty,

    /// The input or its header row could not be read.
    #[error("Unable to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// A row that was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    /// 1-based line number; the header is row 1.
    pub row: u64,
    pub message: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<ImportRowError>,
}

impl ImportReport {
    fn fail(&mut self, row: u64, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(ImportRowError {
            row,
            message: message.into(),
        });
        metrics::counter!("product_import_failures_total").increment(1);
    }
}

struct RawRow {
    line: u64,
    fields: Result<HashMap<String, String>, String>,
}

/// A validated row, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProductRow {
    shop_name: String,
    nomenclature_name: String,
    name_ru: String,
    name_kz: String,
    price: Money,
    quantity: u32,
    specs: Vec<(String, String)>,
}

/// Writes products from a seller's CSV file.
#[derive(Clone)]
pub struct ProductImporter<S: Store> {
    store: S,
}

impl<S: Store> ProductImporter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Imports every row of `reader` into shops of `company_id`.
    #[tracing::instrument(skip(self, reader))]
    pub async fn import<R: Read + Send>(
        &self,
        company_id: CompanyId,
        reader: R,
    ) -> Result<ImportReport, DomainError> {
        let rows = read_rows(reader)?;
        let mut report = ImportReport::default();

        for raw in rows {
            let fields = match raw.fields {
                Ok(fields) => fields,
                Err(message) => {
                    report.fail(raw.line, message);
                    continue;
                }
            };
            let row = match ProductRow::parse(&fields) {
                Ok(row) => row,
                Err(message) => {
                    report.fail(raw.line, message);
                    continue;
                }
            };

            match self.insert_row(company_id, row).await {
                Ok(Ok(())) => {
                    report.imported += 1;
                    metrics::counter!("products_imported_total").increment(1);
                }
                Ok(Err(message)) => report.fail(raw.line, message),
                Err(e) => {
                    tracing::warn!(line = raw.line, error = %e, "import row failed");
                    report.fail(raw.line, format!("Error: {e}"));
                }
            }
        }

        tracing::info!(
            imported = report.imported,
            failed = report.failed,
            "product import finished"
        );
        Ok(report)
    }

    /// Inserts one product with its specs. The inner error is a rejection
    /// to report for the row.
    async fn insert_row(
        &self,
        company_id: CompanyId,
        row: ProductRow,
    ) -> Result<Result<(), String>, DomainError> {
        let mut tx = self.store.begin().await?;

        let Some(shop) = tx.shop_by_name(company_id, &row.shop_name).await? else {
            return Ok(Err(format!(
                "Shop '{}' not found for this company.",
                row.shop_name
            )));
        };
        let Some(nomenclature) = tx.approved_nomenclature(&row.nomenclature_name).await? else {
            return Ok(Err(format!(
                "Approved nomenclature '{}' not found.",
                row.nomenclature_name
            )));
        };

        let product = tx
            .insert_product(NewProduct {
                shop_id: shop.id,
                nomenclature_id: nomenclature.id,
                name_ru: row.name_ru,
                name_kz: row.name_kz,
                price: row.price,
                quantity: row.quantity,
            })
            .await?;
        for (name, value) in row.specs {
            tx.insert_product_spec(ProductSpec {
                product_id: product.id,
                name,
                value,
            })
            .await?;
        }

        tx.commit().await?;
        Ok(Ok(()))
    }
}

/// Byte offsets where each physical line of the input starts.
struct LineIndex(Vec<u64>);

impl LineIndex {
    fn new(input: &[u8]) -> Self {
        let starts = std::iter::once(0)
            .chain(
                input
                    .iter()
                    .enumerate()
                    .filter(|(_, byte)| **byte == b'\n')
                    .map(|(offset, _)| offset as u64 + 1),
            )
            .collect();
        Self(starts)
    }

    /// 1-based line containing `byte`. Blank lines count.
    fn line_of(&self, byte: u64) -> u64 {
        self.0.partition_point(|&start| start <= byte) as u64
    }
}

fn read_rows<R: Read>(mut reader: R) -> Result<Vec<RawRow>, ImportError> {
    let mut input = Vec::new();
    reader
        .read_to_end(&mut input)
        .map_err(csv::Error::from)?;
    let lines = LineIndex::new(&input);

    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input.as_slice());

    let headers: Vec<String> = csv
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::Empty);
    }

    let mut rows = Vec::new();
    for (index, record) in csv.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e
                    .position()
                    .map_or(fallback_line, |p| lines.line_of(p.byte()));
                rows.push(RawRow {
                    line,
                    fields: Err(format!("Error: {e}")),
                });
                continue;
            }
        };
        let line = record
            .position()
            .map_or(fallback_line, |p| lines.line_of(p.byte()));

        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        let fields = if record.len() == headers.len() {
            Ok(headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect())
        } else {
            Err("Invalid row format - column count mismatch.".to_string())
        };
        rows.push(RawRow { line, fields });
    }
    Ok(rows)
}

impl ProductRow {
    fn parse(fields: &HashMap<String, String>) -> Result<Self, String> {
        let shop_name = required(fields, "shop_name")?;
        let nomenclature_name = required(fields, "nomenclature_name")?;
        let name_ru = name(fields, "name_ru")?;
        let name_kz = name(fields, "name_kz")?;

        let price = required(fields, "price")?
            .parse::<Decimal>()
            .map_err(|_| "The price field must be a number.".to_string())?;
        if price < Decimal::ZERO {
            return Err("The price field must be at least 0.".to_string());
        }

        let quantity = required(fields, "quantity")?;
        let quantity = match quantity.parse::<i64>() {
            Ok(q) if q < 0 => return Err("The quantity field must be at least 0.".to_string()),
            Ok(q) => u32::try_from(q)
                .map_err(|_| "The quantity field is too large.".to_string())?,
            Err(_) => return Err("The quantity field must be an integer.".to_string()),
        };

        Ok(Self {
            shop_name,
            nomenclature_name,
            name_ru,
            name_kz,
            price: Money::new(price).round_to_cents(),
            quantity,
            specs: specs(fields),
        })
    }
}

fn required(fields: &HashMap<String, String>, field: &str) -> Result<String, String> {
    fields
        .get(field)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("The {field} field is required."))
}

fn name(fields: &HashMap<String, String>, field: &str) -> Result<String, String> {
    let value = required(fields, field)?;
    if value.chars().count() > NAME_MAX {
        return Err(format!(
            "The {field} field must not be greater than {NAME_MAX} characters."
        ));
    }
    Ok(value)
}

/// `spec_name_1`, `spec_value_1`, ... up to the first missing or blank name.
fn specs(fields: &HashMap<String, String>) -> Vec<(String, String)> {
    (1..)
        .map_while(|i| {
            let name = fields.get(&format!("spec_name_{i}"))?.trim();
            if name.is_empty() {
                return None;
            }
            let value = fields
                .get(&format!("spec_value_{i}"))
                .map(|v| v.trim().to_string())
                .unwrap_or_default();
            Some((name.to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::{InMemoryStore, NomenclatureStatus};

    const HEADER: &str = "shop_name,nomenclature_name,name_ru,name_kz,price,quantity,spec_name_1,spec_value_1,spec_name_2,spec_value_2";

    async fn setup() -> (ProductImporter<InMemoryStore>, InMemoryStore, CompanyId) {
        let store = InMemoryStore::new();
        let company = CompanyId::new(7);
        store.add_shop(company, "Stroymarket").await;
        store.add_shop(CompanyId::new(8), "Чужой").await;
        store
            .add_nomenclature("Цемент", "Цемент", NomenclatureStatus::Approved)
            .await;
        store
            .add_nomenclature("Кирпич", "Кірпіш", NomenclatureStatus::Pending)
            .await;
        (ProductImporter::new(store.clone()), store, company)
    }

    fn csv(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[tokio::test]
    async fn imports_products_with_specs() {
        let (importer, store, company) = setup().await;
        let input = csv(&[
            "Stroymarket,Цемент,Цемент М500,Цемент М500,1500.50,40,Вес,50 кг,Марка,М500",
        ]);

        let report = importer.import(company, input.as_bytes()).await.unwrap();

        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(store.product_count().await, 1);

        // Shops and nomenclatures took ids 1 to 4.
        let product = store
            .product_snapshot(common::ProductId::new(5))
            .await
            .unwrap();
        assert_eq!(product.name_ru, "Цемент М500");
        assert_eq!(product.price, Money::new(Decimal::new(150050, 2)));
        assert_eq!(product.quantity, 40);
        assert!(product.is_active);

        let specs = store.product_specs(product.id).await;
        let specs: Vec<_> = specs.iter().map(|s| (s.name.as_str(), s.value.as_str())).collect();
        assert_eq!(specs, vec![("Вес", "50 кг"), ("Марка", "М500")]);
    }

    #[tokio::test]
    async fn bad_rows_are_reported_and_skipped() {
        let (importer, store, company) = setup().await;
        let input = csv(&[
            "Stroymarket,Цемент,Цемент А,Цемент А,100,1,,,,",
            "Нет такого,Цемент,Цемент Б,Цемент Б,100,1,,,,",
            "Stroymarket,Кирпич,Кирпич,Кірпіш,100,1,,,,",
            "Stroymarket,Цемент,Цемент В,Цемент В,-1,1,,,,",
            "Stroymarket,Цемент,Цемент Г,Цемент Г,100,x,,,,",
            "Stroymarket,Цемент",
            "",
            "Чужой,Цемент,Цемент Д,Цемент Д,100,1,,,,",
            "Stroymarket,Цемент,Цемент Е,Цемент Е,0,0,,,,",
        ]);

        let report = importer.import(company, input.as_bytes()).await.unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 6);
        assert_eq!(store.product_count().await, 2);

        let rows: Vec<u64> = report.errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![3, 4, 5, 6, 7, 9]);
        assert_eq!(
            report.errors[0].message,
            "Shop 'Нет такого' not found for this company."
        );
        assert_eq!(
            report.errors[1].message,
            "Approved nomenclature 'Кирпич' not found."
        );
        assert_eq!(report.errors[2].message, "The price field must be at least 0.");
        assert_eq!(report.errors[3].message, "The quantity field must be an integer.");
        assert_eq!(
            report.errors[4].message,
            "Invalid row format - column count mismatch."
        );
    }

    #[tokio::test]
    async fn row_numbers_count_every_physical_line() {
        let (importer, _, company) = setup().await;
        let input = format!(
            "{HEADER}\r\n\r\n\r\nНет такого,Цемент,А,А,100,1,,,,\r\n   \r\nStroymarket,Кирпич,Б,Б,100,1,,,,\r\n"
        );

        let report = importer.import(company, input.as_bytes()).await.unwrap();

        let rows: Vec<u64> = report.errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![4, 6]);
    }

    #[test]
    fn line_index_maps_offsets_to_lines() {
        let lines = LineIndex::new(b"a\n\nbc\nd");
        assert_eq!(lines.line_of(0), 1);
        assert_eq!(lines.line_of(2), 2);
        assert_eq!(lines.line_of(3), 3);
        assert_eq!(lines.line_of(4), 3);
        assert_eq!(lines.line_of(6), 4);
    }

    #[tokio::test]
    async fn empty_input_is_an_import_error() {
        let (importer, _, company) = setup().await;

        let err = importer.import(company, "".as_bytes()).await.unwrap_err();

        assert!(matches!(err, DomainError::Import(ImportError::Empty)));
    }

    #[test]
    fn specs_stop_at_first_blank_name() {
        let fields: HashMap<String, String> = [
            ("spec_name_1", "Вес"),
            ("spec_value_1", " 50 кг "),
            ("spec_name_2", " "),
            ("spec_value_2", "ignored"),
            ("spec_name_3", "Марка"),
            ("spec_value_3", "М500"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(
            specs(&fields),
            vec![("Вес".to_string(), "50 кг".to_string())]
        );
    }

    #[test]
    fn long_names_are_rejected() {
        let mut fields: HashMap<String, String> = [
            ("shop_name", "Stroymarket"),
            ("nomenclature_name", "Цемент"),
            ("name_kz", "Цемент"),
            ("price", "10"),
            ("quantity", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        fields.insert("name_ru".to_string(), "ц".repeat(NAME_MAX + 1));

        let err = ProductRow::parse(&fields).unwrap_err();
        assert_eq!(
            err,
            "The name_ru field must not be greater than 255 characters."
        );
    }

    #[test]
    fn prices_are_rounded_to_cents() {
        let fields: HashMap<String, String> = [
            ("shop_name", "Stroymarket"),
            ("nomenclature_name", "Цемент"),
            ("name_ru", "Цемент"),
            ("name_kz", "Цемент"),
            ("price", " 99.999 "),
            ("quantity", "3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let row = ProductRow::parse(&fields).unwrap();
        assert_eq!(row.price, Money::new(Decimal::new(10000, 2)));
        assert_eq!(row.quantity, 3);
        assert!(row.specs.is_empty());
    }
}
