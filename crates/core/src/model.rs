//! Region ledger data model.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Geometry
// ============================================================================

/// Axis-aligned box in page space.
///
/// The origin is the top-left corner of the page's visible box and `y` grows
/// downward, so a smaller `y0` means higher on the page. Serialized as
/// `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "[f32; 4]")]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

const RECT_EPSILON: f32 = 0.5;

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_well_formed(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 > self.x0
            && self.y1 > self.y0
    }

    /// True when `other` lies entirely inside `self` (with a small tolerance).
    pub fn contains(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 - RECT_EPSILON
            && other.y0 >= self.y0 - RECT_EPSILON
            && other.x1 <= self.x1 + RECT_EPSILON
            && other.y1 <= self.y1 + RECT_EPSILON
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Same box up to rounding introduced by content-stream number formatting.
    pub fn approx_eq(&self, other: &Rect) -> bool {
        (self.x0 - other.x0).abs() <= RECT_EPSILON
            && (self.y0 - other.y0).abs() <= RECT_EPSILON
            && (self.x1 - other.x1).abs() <= RECT_EPSILON
            && (self.y1 - other.y1).abs() <= RECT_EPSILON
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

impl From<Vec<f32>> for Rect {
    /// Anything but four numbers yields a non-finite rect that fails
    /// `is_well_formed`, so a damaged ledger entry is skipped instead of
    /// failing the whole ledger.
    fn from(values: Vec<f32>) -> Self {
        match values.as_slice() {
            [x0, y0, x1, y1] => Rect::new(*x0, *y0, *x1, *y1),
            _ => Rect::new(f32::NAN, f32::NAN, f32::NAN, f32::NAN),
        }
    }
}

impl From<Rect> for [f32; 4] {
    fn from(r: Rect) -> Self {
        [r.x0, r.y0, r.x1, r.y1]
    }
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Name,
    Contact,
    Institution,
    Image,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Name,
        Category::Contact,
        Category::Institution,
        Category::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Name => "name",
            Category::Contact => "contact",
            Category::Institution => "institution",
            Category::Image => "image",
        }
    }

    pub fn is_text(&self) -> bool {
        !matches!(self, Category::Image)
    }

    fn bit(&self) -> u8 {
        match self {
            Category::Name => 1,
            Category::Contact => 1 << 1,
            Category::Institution => 1 << 2,
            Category::Image => 1 << 3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of categories selected for restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategorySet(u8);

impl CategorySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Category::ALL.iter().copied().collect()
    }

    pub fn with(mut self, category: Category) -> Self {
        self.insert(category);
        self
    }

    pub fn insert(&mut self, category: Category) {
        self.0 |= category.bit();
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    pub fn union(&self, other: CategorySet) -> CategorySet {
        CategorySet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        let mut set = CategorySet::empty();
        for c in iter {
            set.insert(c);
        }
        set
    }
}

// ============================================================================
// Regions and the ledger
// ============================================================================

/// One redacted area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub category: Category,
    /// Original text; `None` for image regions.
    pub text: Option<String>,
    /// Reversible recovery token written into the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    pub rect: Rect,
    pub page: usize,
}

impl Region {
    pub fn text(category: Category, page: usize, rect: Rect, text: String, cipher: String) -> Self {
        Self {
            category,
            text: Some(text),
            cipher: Some(cipher),
            rect,
            page,
        }
    }

    pub fn image(page: usize, rect: Rect) -> Self {
        Self {
            category: Category::Image,
            text: None,
            cipher: None,
            rect,
            page,
        }
    }
}

/// Ordered, append-only record of every region redacted in one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionLedger {
    regions: Vec<Region>,
}

impl RegionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, region: Region) {
        self.regions.push(region);
    }

    pub fn extend(&mut self, regions: impl IntoIterator<Item = Region>) {
        self.regions.extend(regions);
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    /// Regions on `page`, in ledger order.
    pub fn on_page(&self, page: usize) -> impl Iterator<Item = &Region> + '_ {
        self.regions.iter().filter(move |r| r.page == page)
    }

    /// Sub-ledger with only the given categories, order preserved.
    pub fn filter(&self, categories: CategorySet) -> RegionLedger {
        RegionLedger {
            regions: self
                .regions
                .iter()
                .filter(|r| categories.contains(r.category))
                .cloned()
                .collect(),
        }
    }

    pub fn count(&self, category: Category) -> usize {
        self.regions.iter().filter(|r| r.category == category).count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

impl<'a> IntoIterator for &'a RegionLedger {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

// ============================================================================
// Run options and structure
// ============================================================================

/// Which categories an anonymization run redacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    pub redact_name: bool,
    pub redact_contact: bool,
    pub redact_institution: bool,
    pub blur_images: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            redact_name: true,
            redact_contact: true,
            redact_institution: true,
            blur_images: true,
        }
    }
}

impl Options {
    pub fn enabled(&self, category: Category) -> bool {
        match category {
            Category::Name => self.redact_name,
            Category::Contact => self.redact_contact,
            Category::Institution => self.redact_institution,
            Category::Image => self.blur_images,
        }
    }
}

/// Fractions of the page height used as positional gates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Bands {
    /// Top of page 0 that holds the title and is never redacted.
    pub title: f32,
    /// A skip heading must start inside this top band to mark its page.
    pub skip: f32,
    /// Top share of lines scanned by the detector fallbacks.
    pub fallback: f32,
}

impl Default for Bands {
    fn default() -> Self {
        Self {
            title: 0.15,
            skip: 0.20,
            fallback: 0.20,
        }
    }
}

/// Document landmarks derived from page text. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralMarks {
    pub abstract_page: Option<usize>,
    pub abstract_y_cutoff: Option<f32>,
    pub references_page: Option<usize>,
    pub skip_pages: Vec<usize>,
}

impl StructuralMarks {
    pub fn is_skipped(&self, page: usize) -> bool {
        self.skip_pages.contains(&page)
    }

    /// Image regions are only produced strictly after the references page.
    pub fn is_after_references(&self, page: usize) -> bool {
        matches!(self.references_page, Some(r) if page > r)
    }

    /// Whether text starting at `y` on `page` lies before the abstract.
    /// Without an abstract the whole document is front matter.
    pub fn is_front_matter(&self, page: usize, y: f32) -> bool {
        match self.abstract_page {
            None => true,
            Some(a) if page < a => true,
            Some(a) if page == a => self.abstract_y_cutoff.map_or(true, |cutoff| y < cutoff),
            Some(_) => false,
        }
    }
}
