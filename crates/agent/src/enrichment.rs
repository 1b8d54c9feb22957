use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use wayfarer_core::domain::decision::join_place;
use wayfarer_core::geo::search_link;
use wayfarer_core::{MediaCard, TourismPlace, TourismResult, TurnArtifacts};

use crate::ports::Encyclopedia;

const ENRICHED_HIGHLIGHTS: usize = 10;
const CITY_SENTENCES: u8 = 2;
const PLACE_SENTENCES: u8 = 6;
const CAPTION_EXTRACT_CHARS: usize = 240;
const PLACE_SUMMARY_CHARS: usize = 500;
pub const MAP_BUTTON_LABEL: &str = "📍 Открыть на карте";

/// Adds map links, encyclopedia summaries and photos to a tourism answer
/// without another text-generation call. Lookup failures leave the item as
/// it was.
pub struct TourismEnricher {
    encyclopedia: Arc<dyn Encyclopedia>,
}

impl TourismEnricher {
    pub fn new(encyclopedia: Arc<dyn Encyclopedia>) -> Self {
        Self { encyclopedia }
    }

    pub async fn enrich(
        &self,
        tourism: &mut TourismResult,
        city: Option<&str>,
        country: Option<&str>,
        artifacts: &mut TurnArtifacts,
    ) {
        let place = join_place(city, country);

        if let Some(place) = place.as_deref() {
            self.city_card(tourism, place, artifacts).await;
        }

        for food in &mut tourism.food_spots {
            let query = lookup_query(food.query.as_deref(), &food.name, place.as_deref());
            food.maps_url = search_link(&query);
        }
        artifacts.food_items = tourism.food_spots.clone();

        let top = tourism.highlights.iter_mut().take(ENRICHED_HIGHLIGHTS);
        join_all(top.map(|highlight| self.enrich_place(highlight, place.as_deref()))).await;
        artifacts.poi_items =
            tourism.highlights.iter().take(ENRICHED_HIGHLIGHTS).cloned().collect();
    }

    async fn city_card(&self, tourism: &mut TourismResult, place: &str, artifacts: &mut TurnArtifacts) {
        let page = match self.encyclopedia.lookup(place, CITY_SENTENCES).await {
            Ok(page) => page,
            Err(error) => {
                debug!(event_name = "enrichment.city_miss", place, kind = error.kind());
                return;
            }
        };
        let Some(image_url) = page.thumbnail_url else {
            return;
        };

        let title = if tourism.destination_title.trim().is_empty() {
            place
        } else {
            tourism.destination_title.as_str()
        };
        let caption = format!("{title}\n{}", truncate_chars(&page.extract, CAPTION_EXTRACT_CHARS));
        tourism.city_image_url = Some(image_url.clone());
        artifacts.media_queue.push(MediaCard {
            image_url,
            caption: caption.trim_end().to_owned(),
            link_label: Some(MAP_BUTTON_LABEL.to_owned()),
            link_url: search_link(place),
        });
    }

    async fn enrich_place(&self, highlight: &mut TourismPlace, place: Option<&str>) {
        let query = lookup_query(highlight.query.as_deref(), &highlight.name, place);
        highlight.maps_url = search_link(&query);

        match self.encyclopedia.lookup(&query, PLACE_SENTENCES).await {
            Ok(page) => {
                if highlight.summary.is_none() && !page.extract.trim().is_empty() {
                    highlight.summary = Some(truncate_chars(&page.extract, PLACE_SUMMARY_CHARS));
                }
                if highlight.image_url.is_none() {
                    highlight.image_url = page.thumbnail_url;
                }
            }
            Err(error) => debug!(event_name = "enrichment.place_miss", query, kind = error.kind()),
        }
    }
}

fn lookup_query(declared: Option<&str>, name: &str, place: Option<&str>) -> String {
    match (declared.map(str::trim).filter(|q| !q.is_empty()), place) {
        (Some(query), _) => query.to_owned(),
        (None, Some(place)) => format!("{name}, {place}"),
        (None, None) => name.to_owned(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use wayfarer_core::{EvidenceError, FoodPlace, TourismPlace, TourismResult, TurnArtifacts};

    use super::{lookup_query, TourismEnricher, MAP_BUTTON_LABEL};
    use crate::ports::{Encyclopedia, EncyclopediaPage, NoopEncyclopedia};

    struct RomeOnly;

    #[async_trait]
    impl Encyclopedia for RomeOnly {
        async fn lookup(&self, query: &str, _sentences: u8) -> Result<EncyclopediaPage, EvidenceError> {
            match query {
                "Rome, Italy" => Ok(EncyclopediaPage {
                    title: "Rome".into(),
                    extract: "Capital of Italy.".into(),
                    thumbnail_url: Some("https://img.example/rome.jpg".into()),
                }),
                "Colosseum, Rome, Italy" => Ok(EncyclopediaPage {
                    title: "Colosseum".into(),
                    extract: "x".repeat(800),
                    thumbnail_url: Some("https://img.example/colosseum.jpg".into()),
                }),
                _ => Err(EvidenceError::NotFound(query.to_owned())),
            }
        }
    }

    fn rome() -> TourismResult {
        TourismResult {
            destination_title: "Rome, Italy".into(),
            highlights: vec![
                TourismPlace { name: "Colosseum".into(), ..TourismPlace::default() },
                TourismPlace {
                    name: "Secret garden".into(),
                    summary: Some("kept".into()),
                    ..TourismPlace::default()
                },
            ],
            food_spots: vec![FoodPlace {
                name: "Testaccio market".into(),
                ..FoodPlace::default()
            }],
            ..TourismResult::default()
        }
    }

    #[tokio::test]
    async fn highlights_get_links_summaries_and_photos() {
        let enricher = TourismEnricher::new(Arc::new(RomeOnly));
        let mut tourism = rome();
        let mut artifacts = TurnArtifacts::default();

        enricher.enrich(&mut tourism, Some("Rome"), Some("Italy"), &mut artifacts).await;

        let colosseum = &tourism.highlights[0];
        assert_eq!(colosseum.summary.as_ref().map(|s| s.chars().count()), Some(500));
        assert_eq!(colosseum.image_url.as_deref(), Some("https://img.example/colosseum.jpg"));
        assert!(colosseum.maps_url.as_deref().is_some_and(|u| u.contains("Colosseum")));

        let garden = &tourism.highlights[1];
        assert_eq!(garden.summary.as_deref(), Some("kept"));
        assert_eq!(garden.image_url, None);

        assert_eq!(artifacts.poi_items.len(), 2);
        assert!(artifacts.food_items[0].maps_url.is_some());
        assert_eq!(artifacts.media_queue.len(), 1);
        assert_eq!(artifacts.media_queue[0].caption, "Rome, Italy\nCapital of Italy.");
        assert_eq!(artifacts.media_queue[0].link_label.as_deref(), Some(MAP_BUTTON_LABEL));
        assert_eq!(tourism.city_image_url.as_deref(), Some("https://img.example/rome.jpg"));
    }

    #[tokio::test]
    async fn failing_encyclopedia_still_yields_map_links() {
        let enricher = TourismEnricher::new(Arc::new(NoopEncyclopedia));
        let mut tourism = rome();
        let mut artifacts = TurnArtifacts::default();

        enricher.enrich(&mut tourism, None, None, &mut artifacts).await;

        assert!(artifacts.media_queue.is_empty());
        assert!(tourism.highlights.iter().all(|p| p.maps_url.is_some()));
        assert_eq!(tourism.highlights[0].summary, None);
    }

    #[test]
    fn declared_query_wins_over_composed_one() {
        assert_eq!(lookup_query(Some(" Gion, Kyoto "), "Gion", Some("Kyoto")), "Gion, Kyoto");
        assert_eq!(lookup_query(Some(""), "Gion", Some("Kyoto, Japan")), "Gion, Kyoto, Japan");
        assert_eq!(lookup_query(None, "Gion", None), "Gion");
    }
}
