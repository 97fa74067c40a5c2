//! Prompt assembly and the canned fallback library.

use db::models::generated_review::LengthBand;
use db::models::review_card::{ReviewCard, ReviewTone};

pub const SYSTEM_PROMPT: &str = "You are a customer writing a Google Maps review for a \
business you recently visited. Write in the first person and sound like a real person. \
Never mention AI, prompts, or that the review was requested. Output only the review text \
itself, with no quotes, headings, emojis, or markdown.";

const CANNED_EN_HIGH: &[&str] = &[
    "Had a wonderful time at {name}. The {tag} was excellent and the whole experience felt \
     genuinely welcoming. This {category} has earned a loyal customer, and I will happily \
     recommend it to friends.",
    "Five stars for {name}. Everything from the {tag} to the small details was handled with \
     care. Easily one of the better {category} visits I have had this year.",
    "{name} exceeded my expectations. The {tag} stood out, the staff were attentive, and the \
     atmosphere was great. I left already planning my next visit to this {category}.",
];

const CANNED_EN_MID: &[&str] = &[
    "My visit to {name} was decent overall. The {tag} was fine, though a few things could be \
     smoother. A solid {category} with room to grow.",
    "{name} does the basics well. The {tag} met expectations, but nothing stood out as \
     memorable. An average {category} experience.",
    "Mixed feelings about {name}. The {tag} was acceptable and the staff were polite, yet the \
     visit felt ordinary for a {category}.",
];

const CANNED_EN_LOW: &[&str] = &[
    "Unfortunately {name} fell short this time. The {tag} did not meet expectations and the \
     visit left me disappointed. I hope this {category} improves.",
    "My experience at {name} was below average. Issues with the {tag} overshadowed the visit. \
     Leaving honest feedback so this {category} can do better.",
    "{name} has work to do. The {tag} was underwhelming and the overall service felt rushed. \
     Not what I hoped for from this {category}.",
];

const CANNED_ID_HIGH: &[&str] = &[
    "Sangat puas dengan kunjungan ke {name}. Kualitas {tag} luar biasa dan stafnya ramah \
     sekali. Tempat {category} terbaik yang pernah saya datangi, pasti balik lagi.",
    "Pelayanan di {name} benar-benar memuaskan. Semuanya sesuai harapan, terutama {tag}, dan \
     suasananya nyaman. Rekomendasi buat yang sedang mencari {category} yang bisa diandalkan.",
    "Datang ke {name} atas saran teman dan tidak kecewa. Mulai dari {tag} sampai pelayanan \
     semuanya bagus. Salah satu {category} terbaik di daerah ini.",
];

const CANNED_ID_MID: &[&str] = &[
    "Kunjungan ke {name} cukup oke. Secara umum {tag} lumayan, walau masih ada yang bisa \
     diperbaiki. Untuk ukuran {category}, hasilnya standar saja.",
    "Pengalaman di {name} biasa saja. Tidak ada masalah besar dengan {tag}, tapi tidak ada \
     juga yang istimewa untuk {category} sekelas ini.",
    "{name} masih bisa lebih baik lagi. Kualitas {tag} cukup dan stafnya sopan, hanya saja \
     keseluruhannya terasa biasa untuk sebuah {category}.",
];

const CANNED_ID_LOW: &[&str] = &[
    "Sayang sekali pengalaman di {name} kurang memuaskan. Masalah pada {tag} membuat \
     kunjungan jadi mengecewakan. Semoga {category} ini segera berbenah.",
    "Kunjungan ke {name} di bawah harapan. Kualitas {tag} belum konsisten dan pelayanannya \
     terasa terburu-buru. Masukan jujur supaya {category} ini bisa lebih baik.",
    "Belum bisa merekomendasikan {name} untuk saat ini. Pengalaman dengan {tag} mengecewakan \
     dan beberapa hal perlu perhatian serius. Mudah-mudahan {category} ini memperbaiki \
     kualitasnya.",
];

/// Builds the user prompt for one generation attempt.
pub fn build_review_prompt(
    card: &ReviewCard,
    rating: i32,
    language: &str,
    tone: ReviewTone,
    tags: &[String],
    band: LengthBand,
) -> String {
    let range = band.char_range();
    let mut prompt = format!(
        "Write a {rating}-star Google Maps review for \"{name}\", a {category}.\n\
         Language: {lang_name} ({language}).\n\
         Tone: {tone_line}.\n\
         Sentiment: {sentiment}.\n\
         Length: between {min} and {max} characters.",
        rating = rating,
        name = card.business_name,
        category = card.category,
        lang_name = language_name(language),
        language = language,
        tone_line = tone_instruction(tone),
        sentiment = rating_sentiment(rating),
        min = range.start(),
        max = range.end(),
    );
    if !tags.is_empty() {
        prompt.push_str(&format!("\nMention naturally: {}.", tags.join(", ")));
    }
    prompt
}

fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "id" => "Indonesian",
        "ms" => "Malay",
        "es" => "Spanish",
        "pt" => "Portuguese",
        "fr" => "French",
        "de" => "German",
        "nl" => "Dutch",
        "it" => "Italian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "th" => "Thai",
        "vi" => "Vietnamese",
        other => other,
    }
}

fn tone_instruction(tone: ReviewTone) -> &'static str {
    match tone {
        ReviewTone::Friendly => "warm and friendly, like telling a friend about the visit",
        ReviewTone::Professional => "polished and professional, focused on concrete details",
        ReviewTone::Casual => "relaxed and casual, everyday words and short sentences",
        ReviewTone::Grateful => "sincerely grateful, thanking the staff for the experience",
    }
}

fn rating_sentiment(rating: i32) -> &'static str {
    match rating {
        5 => "enthusiastic and highly positive",
        4 => "positive with one small realistic caveat",
        3 => "balanced, mentioning both good points and shortcomings",
        2 => "disappointed but fair and specific",
        _ => "clearly dissatisfied while staying civil",
    }
}

/// Deterministic pre-written review used when every provider attempt has
/// been exhausted. Always returns text inside the requested band: further
/// templates are joined on when one alone sits under the band minimum,
/// and the result is clamped when it runs long.
pub fn canned_review(
    business_name: &str,
    category: &str,
    language: &str,
    rating: i32,
    tags: &[String],
    band: LengthBand,
) -> String {
    let set = canned_set(language, rating);
    let index = (business_name.len() + rating as usize) % set.len();
    let tag = tags
        .first()
        .map(String::as_str)
        .unwrap_or_else(|| default_tag(language));
    let fill = |template: &str| {
        template
            .replace("{name}", business_name)
            .replace("{category}", category)
            .replace("{tag}", tag)
    };

    let min = *band.char_range().start();
    let mut text = fill(set[index]);
    for offset in 1..set.len() {
        if text.chars().count() >= min {
            break;
        }
        text.push(' ');
        text.push_str(&fill(set[(index + offset) % set.len()]));
    }
    clamp_to_band(&text, band)
}

fn canned_set(language: &str, rating: i32) -> &'static [&'static str] {
    let (high, mid, low) = match language {
        "id" => (CANNED_ID_HIGH, CANNED_ID_MID, CANNED_ID_LOW),
        // Only en and id template sets ship today.
        _ => (CANNED_EN_HIGH, CANNED_EN_MID, CANNED_EN_LOW),
    };
    match rating {
        4..=5 => high,
        3 => mid,
        _ => low,
    }
}

fn default_tag(language: &str) -> &'static str {
    match language {
        "id" => "pelayanannya",
        _ => "service",
    }
}

/// Cuts text down to the band maximum, preferring a sentence boundary
/// when one lands inside the band.
pub fn clamp_to_band(text: &str, band: LengthBand) -> String {
    let range = band.char_range();
    let (min, max) = (*range.start(), *range.end());
    if text.chars().count() <= max {
        return text.to_string();
    }
    let prefix: String = text.chars().take(max).collect();
    if let Some(dot) = prefix.rfind('.') {
        let cut = &prefix[..=dot];
        if cut.chars().count() >= min {
            return cut.to_string();
        }
    }
    prefix.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn test_card() -> ReviewCard {
        ReviewCard {
            id: Uuid::new_v4(),
            business_name: "Kopi Senja".to_string(),
            category: "coffee shop".to_string(),
            maps_url: "https://maps.google.com/?cid=42".to_string(),
            slug: "kopi2345".to_string(),
            service_tags: r#"["latte","pastries"]"#.to_string(),
            languages: r#"["en","id"]"#.to_string(),
            default_language: "en".to_string(),
            tone: ReviewTone::Friendly,
            enabled: true,
            synced: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_includes_business_and_length_range() {
        let card = test_card();
        let prompt = build_review_prompt(
            &card,
            5,
            "en",
            ReviewTone::Friendly,
            &[],
            LengthBand::Short,
        );
        assert!(prompt.contains("Kopi Senja"));
        assert!(prompt.contains("coffee shop"));
        assert!(prompt.contains("English"));
        assert!(prompt.contains("between 80 and 160 characters"));
        assert!(!prompt.contains("Mention naturally"));
    }

    #[test]
    fn test_prompt_lists_tags() {
        let card = test_card();
        let tags = vec!["latte".to_string(), "pastries".to_string()];
        let prompt = build_review_prompt(
            &card,
            4,
            "id",
            ReviewTone::Casual,
            &tags,
            LengthBand::Medium,
        );
        assert!(prompt.contains("Mention naturally: latte, pastries."));
        assert!(prompt.contains("Indonesian"));
    }

    #[test]
    fn test_canned_review_substitutes_placeholders() {
        let text = canned_review(
            "Kopi Senja",
            "coffee shop",
            "en",
            5,
            &["latte".to_string()],
            LengthBand::Medium,
        );
        assert!(text.contains("Kopi Senja"));
        assert!(!text.contains('{'));
        assert!(!text.contains('}'));
    }

    #[test]
    fn test_canned_review_unknown_language_uses_english_set() {
        let tags = vec!["croissants".to_string()];
        let fr = canned_review("Boulangerie", "bakery", "fr", 3, &tags, LengthBand::Medium);
        let en = canned_review("Boulangerie", "bakery", "en", 3, &tags, LengthBand::Medium);
        assert_eq!(fr, en);
    }

    #[test]
    fn test_canned_review_reaches_long_band_floor() {
        for (language, rating) in [("en", 5), ("en", 3), ("en", 1), ("id", 5), ("id", 3)] {
            let text = canned_review(
                "Kopi Senja",
                "coffee shop",
                language,
                rating,
                &["latte".to_string()],
                LengthBand::Long,
            );
            let chars = text.chars().count();
            assert!(
                LengthBand::Long.contains(chars),
                "{language}/{rating} fallback was {chars} chars"
            );
        }
    }

    #[test]
    fn test_canned_review_rating_buckets_differ() {
        let happy = canned_review("Kopi Senja", "coffee shop", "en", 5, &[], LengthBand::Long);
        let unhappy = canned_review("Kopi Senja", "coffee shop", "en", 1, &[], LengthBand::Long);
        assert_ne!(happy, unhappy);
    }

    #[test]
    fn test_clamp_keeps_short_text() {
        let text = "Great spot.";
        assert_eq!(clamp_to_band(text, LengthBand::Short), text);
    }

    #[test]
    fn test_clamp_cuts_at_sentence_boundary() {
        let sentence = "This place was genuinely great and I would come back any day of the \
                        week without thinking twice about it. ";
        let long = sentence.repeat(6);
        let clamped = clamp_to_band(&long, LengthBand::Medium);
        assert!(clamped.chars().count() <= 300);
        assert!(clamped.chars().count() >= 160);
        assert!(clamped.ends_with('.'));
    }

    #[test]
    fn test_clamp_hard_truncates_without_sentences() {
        let long = "word ".repeat(200);
        let clamped = clamp_to_band(&long, LengthBand::Short);
        assert!(clamped.chars().count() <= 160);
        assert!(!clamped.ends_with(' '));
    }
}
