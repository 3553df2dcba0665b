//! Human-readable, year-scoped order numbers: `ORD-<year>-<sequence>`.

use std::fmt;
use std::str::FromStr;

use storage::UnitOfWork;
use thiserror::Error;

use crate::error::DomainError;

const PREFIX: &str = "ORD";

/// Width the sequence is zero-padded to.
const SEQUENCE_WIDTH: usize = 5;

/// A parsed order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderNumber {
    year: i32,
    sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid order number: {0}")]
pub struct ParseOrderNumberError(String);

impl OrderNumber {
    pub fn new(year: i32, sequence: u32) -> Self {
        Self { year, sequence }
    }

    /// The first number of a year.
    pub fn first(year: i32) -> Self {
        Self::new(year, 1)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The number that follows `latest` within `year`.
    ///
    /// `latest` is the number of the most recently inserted order of that
    /// year. Only its sequence is used. An unreadable number restarts at 1
    /// and is left to the unique constraint to catch.
    pub fn following(year: i32, latest: Option<&str>) -> Self {
        let Some(latest) = latest else {
            return Self::first(year);
        };

        match latest.parse::<OrderNumber>() {
            Ok(number) => Self::new(year, number.sequence.saturating_add(1)),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable latest order number");
                Self::first(year)
            }
        }
    }

    /// The prefix shared by every number of `year`, e.g. `ORD-2026-`.
    pub fn year_prefix(year: i32) -> String {
        format!("{PREFIX}-{year}-")
    }

    /// Computes the next order number for `year` from the store.
    pub async fn next_for_year<U: UnitOfWork>(
        tx: &mut U,
        year: i32,
    ) -> Result<OrderNumber, DomainError> {
        let latest = tx
            .latest_order_number_with_prefix(&Self::year_prefix(year))
            .await?;
        Ok(Self::following(year, latest.as_deref()))
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}-{}-{:0width$}",
            self.year,
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

impl FromStr for OrderNumber {
    type Err = ParseOrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseOrderNumberError(s.to_string());

        let mut parts = s.splitn(3, '-');
        if parts.next() != Some(PREFIX) {
            return Err(invalid());
        }
        let year = parts
            .next()
            .filter(|y| y.len() == 4 && y.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|y| y.parse().ok())
            .ok_or_else(invalid)?;
        let sequence = parts
            .next()
            .filter(|n| n.len() >= SEQUENCE_WIDTH && n.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|n| n.parse().ok())
            .ok_or_else(invalid)?;

        Ok(Self { year, sequence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use common::{CompanyId, CustomerId, Money};
    use storage::{Delivery, InMemoryStore, NewOrder, Store};

    #[test]
    fn formats_with_zero_padding() {
        assert_eq!(OrderNumber::first(2026).to_string(), "ORD-2026-00001");
        assert_eq!(OrderNumber::new(2026, 420).to_string(), "ORD-2026-00420");
        assert_eq!(OrderNumber::new(2026, 123456).to_string(), "ORD-2026-123456");
    }

    #[test]
    fn parses_what_it_formats() {
        let number: OrderNumber = "ORD-2025-00042".parse().unwrap();
        assert_eq!(number, OrderNumber::new(2025, 42));
        assert_eq!(
            "ORD-2025-123456".parse::<OrderNumber>().unwrap().sequence(),
            123456
        );
    }

    #[test]
    fn rejects_malformed_numbers() {
        for bad in ["", "ORD", "ORD-2025", "ORD-25-00001", "INV-2025-00001", "ORD-2025-1", "ORD-2025-0000x"] {
            assert!(bad.parse::<OrderNumber>().is_err(), "{bad}");
        }
    }

    #[test]
    fn following_increments_sequence() {
        assert_eq!(OrderNumber::following(2026, None), OrderNumber::first(2026));
        assert_eq!(
            OrderNumber::following(2026, Some("ORD-2026-00041")),
            OrderNumber::new(2026, 42)
        );
        assert_eq!(
            OrderNumber::following(2026, Some("garbage")),
            OrderNumber::first(2026)
        );
    }

    #[tokio::test]
    async fn next_for_year_only_looks_at_that_year() {
        let store = InMemoryStore::new();
        let shop = store.add_shop(CompanyId::new(1), "Stroymarket").await;
        let city = store.add_city("Шымкент", "Шымкент").await;

        let mut tx = store.begin().await.unwrap();
        let old = tx
            .insert_order(NewOrder {
                order_number: "ORD-2020-00007".to_string(),
                customer_id: CustomerId::new(1),
                shop_id: shop.id,
                subtotal: Money::zero(),
                total: Money::zero(),
                delivery: Delivery {
                    address: "ул. Байтурсынова 5".to_string(),
                    entry: None,
                    floor: None,
                    apartment: None,
                    intercom: None,
                    city_id: city.id,
                    contact_phone: "+77020000000".to_string(),
                    notes: None,
                },
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        store
            .backdate_order(old.id, "2020-12-31T23:59:59Z".parse().unwrap())
            .await;

        let mut tx = store.begin().await.unwrap();
        let this_year = chrono::Utc::now().year();
        assert_eq!(
            OrderNumber::next_for_year(&mut tx, this_year).await.unwrap(),
            OrderNumber::first(this_year)
        );
        assert_eq!(
            OrderNumber::next_for_year(&mut tx, 2020).await.unwrap(),
            OrderNumber::new(2020, 8)
        );
    }

    #[tokio::test]
    async fn next_for_year_follows_numbers_stamped_in_the_previous_year() {
        let store = InMemoryStore::new();
        let shop = store.add_shop(CompanyId::new(1), "Stroymarket").await;
        let city = store.add_city("Шымкент", "Шымкент").await;

        // Numbered on 1 January while the row clock still read 31 December.
        let mut tx = store.begin().await.unwrap();
        let straddling = tx
            .insert_order(NewOrder {
                order_number: "ORD-2026-00001".to_string(),
                customer_id: CustomerId::new(1),
                shop_id: shop.id,
                subtotal: Money::zero(),
                total: Money::zero(),
                delivery: Delivery {
                    address: "ул. Байтурсынова 5".to_string(),
                    entry: None,
                    floor: None,
                    apartment: None,
                    intercom: None,
                    city_id: city.id,
                    contact_phone: "+77020000000".to_string(),
                    notes: None,
                },
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        store
            .backdate_order(straddling.id, "2025-12-31T23:59:59Z".parse().unwrap())
            .await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            OrderNumber::next_for_year(&mut tx, 2026).await.unwrap(),
            OrderNumber::new(2026, 2)
        );
        assert_eq!(
            OrderNumber::next_for_year(&mut tx, 2025).await.unwrap(),
            OrderNumber::first(2025)
        );
    }

    #[test]
    fn year_prefix_matches_formatted_numbers() {
        let prefix = OrderNumber::year_prefix(2026);
        assert!(OrderNumber::new(2026, 7).to_string().starts_with(&prefix));
        assert!(!OrderNumber::new(2025, 7).to_string().starts_with(&prefix));
    }

    #[tokio::test]
    async fn next_for_year_starts_at_one_on_empty_store() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let number = OrderNumber::next_for_year(&mut tx, 2026).await.unwrap();
        assert_eq!(number.to_string(), "ORD-2026-00001");
    }
}
