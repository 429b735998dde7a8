use crate::browser::Interactor;
use crate::error::ScrapeError;
use crate::flow::selectors::Selectors;
use crate::models::{DatiPreventivo, QuoteRecord};
use crate::utils::{normalize_price_text, parse_eur_price};
use fantoccini::elements::Element;
use fantoccini::Locator;
use std::time::Duration;

const SITE_NAME: &str = "preventivass.it";
const PRODUCT: &str = "RCA";

/// Scrapes the rendered quote cards. An empty results page is a legitimate
/// outcome (no company quoted this profile) and yields an empty vec; a card
/// whose price cannot be read is skipped with a warning.
pub async fn extract_quotes(
    interactor: &Interactor,
    task_id: &str,
    dati: &DatiPreventivo,
    guida: &str,
) -> Result<Vec<QuoteRecord>, ScrapeError> {
    if interactor
        .check_element("quote cards", Selectors::QUOTE_CARDS, Duration::from_secs(60))
        .await?
        .is_none()
    {
        tracing::warn!("TID: {} | 📊 No quote cards rendered", task_id);
        return Ok(Vec::new());
    }

    let cards = interactor
        .client()
        .find_all(Locator::XPath(Selectors::QUOTE_CARDS))
        .await
        .map_err(crate::error::ElementError::from)?;

    tracing::info!("TID: {} | 📊 {} quote cards found", task_id, cards.len());

    let mut quotes = Vec::new();
    for (index, card) in cards.iter().enumerate() {
        match extract_card(card, dati, guida).await {
            Ok(quote) => {
                tracing::debug!(
                    "TID: {} | 📊 {} -> {}",
                    task_id,
                    quote.compagnia,
                    quote.prezzo
                );
                quotes.push(quote);
            }
            Err(reason) => {
                tracing::warn!("TID: {} | 📊 Card {} skipped: {}", task_id, index, reason);
            }
        }
    }

    Ok(quotes)
}

async fn extract_card(
    card: &Element,
    dati: &DatiPreventivo,
    guida: &str,
) -> Result<QuoteRecord, String> {
    let compagnia = card
        .find(Locator::XPath(Selectors::CARD_TITLE))
        .await
        .map_err(|e| format!("title not found: {}", e))?
        .text()
        .await
        .map_err(|e| format!("title unreadable: {}", e))?
        .trim()
        .to_string();

    // The discounted price is shown when present, otherwise the standard
    // price container holds the only figure.
    let price_text = match card.find(Locator::XPath(Selectors::CARD_PRICE_DISCOUNTED)).await {
        Ok(elem) => elem
            .text()
            .await
            .map_err(|e| format!("price unreadable: {}", e))?,
        Err(_) => card
            .find(Locator::XPath(Selectors::CARD_PRICE_STANDARD))
            .await
            .map_err(|e| format!("no price element: {}", e))?
            .text()
            .await
            .map_err(|e| format!("price unreadable: {}", e))?,
    };

    let prezzo = parse_eur_price(&price_text)?;

    Ok(QuoteRecord {
        id_accordo: dati.id_accordo,
        id_fascia: dati.id_fascia,
        sito: SITE_NAME.to_string(),
        compagnia,
        prodotto: PRODUCT.to_string(),
        guida: guida.to_string(),
        prezzo_totale: normalize_price_text(&price_text),
        prezzo,
    })
}
