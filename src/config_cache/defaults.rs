//! Built-in fallback field, feature, and currency maps, used whenever
//! the database is unreachable or has no active rows yet.

use std::collections::HashMap;

/// Order matters: lookup is "first substring match wins", so entries here
/// are listed highest-priority first, matching how DB-backed mappings are
/// loaded (`ORDER BY priority DESC`).
pub fn default_field_map() -> Vec<(String, String)> {
    [
        ("preço", "price"),
        ("preco", "price"),
        ("price", "price"),
        ("quartos", "bedrooms"),
        ("bedrooms", "bedrooms"),
        ("casas de banho", "bathrooms"),
        ("bathrooms", "bathrooms"),
        ("tipologia", "typology"),
        ("typology", "typology"),
        ("piso", "floor"),
        ("floor", "floor"),
        ("condição", "condition"),
        ("condition", "condition"),
        ("referência", "property_id"),
        ("reference", "property_id"),
        ("ano de construção", "construction_year"),
        ("construction year", "construction_year"),
        ("certificado energético", "energy_certificate"),
        ("energy certificate", "energy_certificate"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn default_feature_map() -> Vec<(String, String)> {
    [
        ("garagem", "garage"),
        ("garage", "garage"),
        ("elevador", "elevator"),
        ("elevator", "elevator"),
        ("varanda", "balcony"),
        ("balcony", "balcony"),
        ("ar condicionado", "air_conditioning"),
        ("air conditioning", "air_conditioning"),
        ("piscina", "swimming_pool"),
        ("pool", "swimming_pool"),
        ("jardim", "garden"),
        ("garden", "garden"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn default_currency_map() -> HashMap<String, String> {
    [
        ("€", "EUR"),
        ("eur", "EUR"),
        ("euro", "EUR"),
        ("euros", "EUR"),
        ("$", "USD"),
        ("usd", "USD"),
        ("£", "GBP"),
        ("gbp", "GBP"),
        ("R$", "BRL"),
        ("brl", "BRL"),
        ("¥", "JPY"),
        ("jpy", "JPY"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
