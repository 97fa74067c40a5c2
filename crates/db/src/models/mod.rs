pub mod card_tombstone;
pub mod generated_review;
pub mod review_card;
