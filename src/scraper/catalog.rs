use serde::Serialize;

/// A website the scraper screen offers, with the fields it can collect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Website {
    pub id: &'static str,
    pub name: &'static str,
    pub fields: &'static [&'static str],
    /// Directory listings are browsed without a keyword
    pub requires_search_term: bool,
}

impl Website {
    pub fn offers(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }
}

const fn site(
    id: &'static str,
    name: &'static str,
    fields: &'static [&'static str],
) -> Website {
    Website {
        id,
        name,
        fields,
        requires_search_term: true,
    }
}

pub static WEBSITES: &[Website] = &[
    site("amazon", "Amazon", &["title", "price", "rating", "reviews", "description"]),
    site("ebay", "eBay", &["title", "price", "condition", "location", "shipping"]),
    site("linkedin", "LinkedIn", &["title", "company", "location", "description", "requirements"]),
    site("google", "Google Search", &["title", "url", "description", "relatedLinks"]),
    site("tripadvisor", "Tripadvisor", &["name", "rating", "reviews", "address", "amenities"]),
    site("indeed", "Indeed", &["title", "company", "location", "salary", "description"]),
    Website {
        id: "yellowpages",
        name: "Yellow Pages",
        fields: &["name", "phone", "address", "category", "website"],
        requires_search_term: false,
    },
    site("etsy", "Etsy", &["title", "price", "shop", "rating", "shipping"]),
    site("craigslist", "Craigslist", &["title", "price", "location", "date", "description"]),
    site("twitter", "Twitter/X", &["tweet", "username", "date", "likes", "retweets"]),
];

pub fn find(id: &str) -> Option<&'static Website> {
    WEBSITES.iter().find(|site| site.id == id)
}

/// Lookup by display name, as stored on tasks
pub fn find_by_name(name: &str) -> Option<&'static Website> {
    WEBSITES.iter().find(|site| site.name == name)
}
