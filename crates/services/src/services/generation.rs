//! The generation loop: ask each configured writer for review text, retry a
//! fixed number of times when the output misses the length band or repeats a
//! recent review, and fall back to the canned library when everything fails.
//! A customer request never surfaces a provider error.

use std::sync::Arc;

use db::models::generated_review::{
    CreateGeneratedReview, GenerateReviewRequest, GeneratedReview, LengthBand, ReviewProvider,
};
use db::models::review_card::{ReviewCard, ReviewTone};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::prompts;
use super::review_writer::ReviewWriter;
use super::uniqueness::{self, UniquenessGuard, UniquenessVerdict};

const MAX_ATTEMPTS_PER_WRITER: usize = 3;
const RECENT_WINDOW: i64 = 50;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("review card is disabled")]
    CardDisabled,
    #[error("language '{0}' is not offered by this card")]
    UnsupportedLanguage(String),
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i32),
}

pub struct ReviewGenerationService {
    pool: SqlitePool,
    writers: Vec<Arc<dyn ReviewWriter>>,
    guard: UniquenessGuard,
}

impl ReviewGenerationService {
    pub fn new(pool: SqlitePool, writers: Vec<Arc<dyn ReviewWriter>>) -> Self {
        Self {
            pool,
            writers,
            guard: UniquenessGuard::default(),
        }
    }

    /// Produce and persist one review for a card. Writer failures, length
    /// misses and near-duplicates are burned attempts; once every writer is
    /// exhausted the canned fallback is stored instead.
    pub async fn generate(
        &self,
        card: &ReviewCard,
        req: &GenerateReviewRequest,
    ) -> Result<GeneratedReview, GenerationError> {
        if !card.enabled {
            return Err(GenerationError::CardDisabled);
        }
        if !(1..=5).contains(&req.rating) {
            return Err(GenerationError::InvalidRating(req.rating));
        }

        let language = req
            .language
            .clone()
            .unwrap_or_else(|| card.default_language.clone());
        if !card.offers_language(&language) {
            return Err(GenerationError::UnsupportedLanguage(language));
        }
        let tone = req.tone.unwrap_or(card.tone);
        let tags = req
            .service_tags
            .clone()
            .unwrap_or_else(|| card.parsed_service_tags());
        let band = req.length.unwrap_or_default();

        let recent = GeneratedReview::find_recent_by_card(&self.pool, card.id, RECENT_WINDOW).await?;
        let prompt = prompts::build_review_prompt(card, req.rating, &language, tone, &tags, band);
        let max_tokens = max_output_tokens(band);

        let mut attempts: i32 = 0;
        for writer in &self.writers {
            for attempt in 1..=MAX_ATTEMPTS_PER_WRITER {
                attempts += 1;
                let raw = match writer.write_review(prompts::SYSTEM_PROMPT, &prompt, max_tokens).await
                {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(
                            provider = %writer.provider(),
                            attempt,
                            "review generation attempt failed: {}",
                            e
                        );
                        continue;
                    }
                };

                let text = tidy_output(&raw);
                let chars = text.chars().count();
                if !band.contains(chars) {
                    warn!(
                        provider = %writer.provider(),
                        attempt,
                        chars,
                        "generated text missed the length band"
                    );
                    continue;
                }

                match self.guard.check(&text, &recent) {
                    UniquenessVerdict::Unique => {
                        return Ok(self
                            .persist(card, req.rating, &language, tone, &tags, &text, writer.provider(), attempts)
                            .await?);
                    }
                    verdict => {
                        warn!(
                            provider = %writer.provider(),
                            attempt,
                            ?verdict,
                            "generated text too close to a recent review"
                        );
                    }
                }
            }
        }

        info!(card_id = %card.id, attempts, "all writers exhausted, serving canned review");
        let canned = prompts::canned_review(
            &card.business_name,
            &card.category,
            &language,
            req.rating,
            &tags,
            band,
        );
        Ok(self
            .persist(
                card,
                req.rating,
                &language,
                tone,
                &tags,
                &canned,
                ReviewProvider::Canned,
                attempts.max(1),
            )
            .await?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        card: &ReviewCard,
        rating: i32,
        language: &str,
        tone: ReviewTone,
        tags: &[String],
        content: &str,
        provider: ReviewProvider,
        attempts: i32,
    ) -> Result<GeneratedReview, sqlx::Error> {
        let data = CreateGeneratedReview {
            card_id: card.id,
            rating,
            language: language.to_string(),
            tone,
            service_tags: tags.to_vec(),
            content: content.to_string(),
            provider,
            content_hash: uniqueness::content_hash(content),
            ngram_hash: uniqueness::simhash(content) as i64,
            attempts,
        };
        GeneratedReview::create(&self.pool, &data, Uuid::new_v4()).await
    }
}

fn max_output_tokens(band: LengthBand) -> u32 {
    match band {
        LengthBand::Short => 200,
        LengthBand::Medium => 320,
        LengthBand::Long => 520,
    }
}

/// Models sometimes wrap the review in quotes or pad it with newlines.
fn tidy_output(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gemini_api::GeminiApiError;
    use crate::services::review_writer::ReviewWriterError;
    use async_trait::async_trait;
    use db::DBService;
    use db::models::review_card::CreateReviewCard;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TEXT_A: &str = "Dropped in for an oil change after work and the crew had me back on \
                          the road in under forty minutes. They showed me the worn filter \
                          before swapping it, quoted the price upfront, and the waiting area \
                          actually had decent coffee.";
    const TEXT_B: &str = "The barber remembered exactly how I like my fade from a single \
                          previous visit, took his time around the edges, and talked me out of \
                          an overpriced product I did not need. Walked out feeling sharp and \
                          paid less than I expected to.";

    struct ScriptedWriter {
        provider: ReviewProvider,
        outputs: Mutex<VecDeque<Result<String, ReviewWriterError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedWriter {
        fn new(
            provider: ReviewProvider,
            outputs: Vec<Result<String, ReviewWriterError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                provider,
                outputs: Mutex::new(outputs.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReviewWriter for ScriptedWriter {
        fn provider(&self) -> ReviewProvider {
            self.provider
        }

        async fn write_review(
            &self,
            _system: &str,
            _prompt: &str,
            _max_tokens: u32,
        ) -> Result<String, ReviewWriterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outputs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ReviewWriterError::Gemini(GeminiApiError::EmptyCompletion)))
        }
    }

    async fn setup() -> (DBService, ReviewCard) {
        let db = DBService::memory().await.unwrap();
        let data = CreateReviewCard {
            business_name: "Bengkel Maju".to_string(),
            category: "car repair shop".to_string(),
            maps_url: "https://maps.google.com/?cid=9".to_string(),
            service_tags: vec!["oil change".to_string()],
            languages: vec!["en".to_string(), "id".to_string()],
            default_language: Some("en".to_string()),
            tone: None,
        };
        let card = ReviewCard::create_with_unique_slug(&db.pool, &data)
            .await
            .unwrap();
        (db, card)
    }

    fn request() -> GenerateReviewRequest {
        GenerateReviewRequest {
            rating: 5,
            language: None,
            tone: None,
            service_tags: None,
            length: None,
        }
    }

    #[tokio::test]
    async fn test_first_attempt_accepted() {
        let (db, card) = setup().await;
        let writer = ScriptedWriter::new(ReviewProvider::Gemini, vec![Ok(TEXT_A.to_string())]);
        let service =
            ReviewGenerationService::new(db.pool.clone(), vec![writer.clone() as Arc<dyn ReviewWriter>]);

        let review = service.generate(&card, &request()).await.unwrap();

        assert_eq!(review.provider, ReviewProvider::Gemini);
        assert_eq!(review.attempts, 1);
        assert!(LengthBand::Medium.contains(review.char_count as usize));
        assert_eq!(writer.calls(), 1);
        assert_eq!(
            GeneratedReview::count_by_card(&db.pool, card.id).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_retries_when_output_misses_band() {
        let (db, card) = setup().await;
        let writer = ScriptedWriter::new(
            ReviewProvider::Gemini,
            vec![Ok("Great place.".to_string()), Ok(TEXT_A.to_string())],
        );
        let service =
            ReviewGenerationService::new(db.pool.clone(), vec![writer.clone() as Arc<dyn ReviewWriter>]);

        let review = service.generate(&card, &request()).await.unwrap();

        assert_eq!(review.attempts, 2);
        assert_eq!(writer.calls(), 2);
        assert_eq!(review.provider, ReviewProvider::Gemini);
    }

    #[tokio::test]
    async fn test_near_duplicate_burned_then_fresh_accepted() {
        let (db, card) = setup().await;
        // Seed history with TEXT_A so a close variant gets rejected.
        let seed = CreateGeneratedReview {
            card_id: card.id,
            rating: 5,
            language: "en".to_string(),
            tone: ReviewTone::Friendly,
            service_tags: vec![],
            content: TEXT_A.to_string(),
            provider: ReviewProvider::Gemini,
            content_hash: uniqueness::content_hash(TEXT_A),
            ngram_hash: uniqueness::simhash(TEXT_A) as i64,
            attempts: 1,
        };
        GeneratedReview::create(&db.pool, &seed, Uuid::new_v4())
            .await
            .unwrap();

        let near_duplicate = TEXT_A.replace("forty", "thirty");
        let writer = ScriptedWriter::new(
            ReviewProvider::Gemini,
            vec![Ok(near_duplicate), Ok(TEXT_B.to_string())],
        );
        let service =
            ReviewGenerationService::new(db.pool.clone(), vec![writer.clone() as Arc<dyn ReviewWriter>]);

        let review = service.generate(&card, &request()).await.unwrap();

        assert_eq!(review.attempts, 2);
        assert!(review.content.contains("barber"));
    }

    #[tokio::test]
    async fn test_second_writer_picks_up_after_first_writer_fails() {
        let (db, card) = setup().await;
        let failing = ScriptedWriter::new(ReviewProvider::Gemini, vec![]);
        let backup = ScriptedWriter::new(ReviewProvider::Openai, vec![Ok(TEXT_A.to_string())]);
        let service = ReviewGenerationService::new(
            db.pool.clone(),
            vec![
                failing.clone() as Arc<dyn ReviewWriter>,
                backup.clone() as Arc<dyn ReviewWriter>,
            ],
        );

        let review = service.generate(&card, &request()).await.unwrap();

        assert_eq!(review.provider, ReviewProvider::Openai);
        assert_eq!(review.attempts, 4);
        assert_eq!(failing.calls(), MAX_ATTEMPTS_PER_WRITER);
        assert_eq!(backup.calls(), 1);
    }

    #[tokio::test]
    async fn test_canned_fallback_when_everything_fails() {
        let (db, card) = setup().await;
        let first = ScriptedWriter::new(ReviewProvider::Gemini, vec![]);
        let second = ScriptedWriter::new(ReviewProvider::Openai, vec![]);
        let service = ReviewGenerationService::new(
            db.pool.clone(),
            vec![
                first.clone() as Arc<dyn ReviewWriter>,
                second.clone() as Arc<dyn ReviewWriter>,
            ],
        );

        let review = service.generate(&card, &request()).await.unwrap();

        assert_eq!(review.provider, ReviewProvider::Canned);
        assert_eq!(review.attempts, 6);
        assert!(review.content.contains("Bengkel Maju"));
        // The fallback is persisted like any other review.
        assert_eq!(
            GeneratedReview::count_by_card(&db.pool, card.id).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_disabled_card_is_rejected_before_any_call() {
        let (db, card) = setup().await;
        let card = ReviewCard::set_enabled(&db.pool, card.id, false)
            .await
            .unwrap();
        let writer = ScriptedWriter::new(ReviewProvider::Gemini, vec![Ok(TEXT_A.to_string())]);
        let service =
            ReviewGenerationService::new(db.pool.clone(), vec![writer.clone() as Arc<dyn ReviewWriter>]);

        let err = service.generate(&card, &request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::CardDisabled));
        assert_eq!(writer.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_rating_and_language() {
        let (db, card) = setup().await;
        let service = ReviewGenerationService::new(db.pool.clone(), vec![]);

        let mut req = request();
        req.rating = 6;
        assert!(matches!(
            service.generate(&card, &req).await.unwrap_err(),
            GenerationError::InvalidRating(6)
        ));

        let mut req = request();
        req.language = Some("fr".to_string());
        match service.generate(&card, &req).await.unwrap_err() {
            GenerationError::UnsupportedLanguage(lang) => assert_eq!(lang, "fr"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tidy_output_strips_quotes_and_newlines() {
        let raw = format!("\"{}\"\n", TEXT_A.replace(". ", ".\n"));
        let tidied = tidy_output(&raw);
        assert!(!tidied.starts_with('"'));
        assert!(!tidied.contains('\n'));
        assert_eq!(tidied, TEXT_A);
    }
}
