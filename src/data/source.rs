use chrono::NaiveDate;

use crate::domain::QuoteSet;
use crate::error::AppError;

/// Anything that can supply one reference date's quotes.
///
/// `Ok(None)` means nothing was published for that date (weekend, holiday).
pub trait QuoteSource {
    fn fetch_quotes(&self, date: NaiveDate) -> Result<Option<QuoteSet>, AppError>;
}

impl<S: QuoteSource + ?Sized> QuoteSource for Box<S> {
    fn fetch_quotes(&self, date: NaiveDate) -> Result<Option<QuoteSet>, AppError> {
        (**self).fetch_quotes(date)
    }
}

impl<S: QuoteSource + ?Sized> QuoteSource for &S {
    fn fetch_quotes(&self, date: NaiveDate) -> Result<Option<QuoteSet>, AppError> {
        (**self).fetch_quotes(date)
    }
}
