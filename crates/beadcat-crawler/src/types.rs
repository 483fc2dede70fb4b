use reqwest::Url;

/// A fetched page body and the URL it was served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: Url,
    pub body: String,
}

/// Fields pulled from one product tile before any normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProductTile {
    /// Position of the tile on its page, used to reference tiles without a link.
    pub index: usize,
    pub name: String,
    pub detail_link: Url,
    pub image_link: Option<Url>,
    pub price_text: Option<String>,
}
