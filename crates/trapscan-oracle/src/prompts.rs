//! Counting prompts
//!
//! Prompts push the oracle toward actually counting instead of guessing:
//! - the JSON template carries placeholders, never numeric example values
//! - the category gets a concrete visual description
//! - the hint, when present, is framed as context rather than an answer

use trapscan_types::Category;

/// Visual description of what to count for a category
fn category_description(category: Category) -> &'static str {
    match category {
        Category::Aphid => "aphids: small soft-bodied insects, green to black, 1-3mm, often clustered",
        Category::Whitefly => "whiteflies: tiny white moth-like insects with powdery wings",
        Category::Thrips => "thrips: slender elongated insects, 1-2mm, yellow to dark brown",
        Category::FungusGnat => "fungus gnats: small dark flies with long legs and antennae",
        Category::SpiderMite => "spider mites: very small dots, reddish or pale, often near webbing",
        Category::Germinated => "tray cells with an emerged seedling (visible cotyledons or stem)",
        Category::Ungerminated => "tray cells with no visible emergence, bare substrate only",
        Category::AbnormalSprout => "tray cells with deformed, discolored, or collapsed seedlings",
    }
}

/// Build the counting prompt for one category on one image
pub fn build_count_prompt(category: Category, expected_hint: Option<u32>) -> String {
    let mut prompt = format!(
        "You are analyzing a single photo of a sticky pest trap or seed tray.\n\
         Count exactly one thing: {}.\n\
         \n\
         Count only what is clearly visible. Do not estimate from density or\n\
         extrapolate beyond the visible area. If none are visible, the count\n\
         is 0.\n",
        category_description(category)
    );

    if let Some(hint) = expected_hint {
        prompt.push_str(&format!(
            "\nFor context, a previous scan of the same subject counted about {hint}.\n\
             Use this only to calibrate what to look for; report what you see now.\n"
        ));
    }

    prompt.push_str(
        "\nOutput strictly as JSON, with no surrounding text:\n\
         {\n\
         \x20 \"count\": <integer, number of items counted>,\n\
         \x20 \"locations\": [{\"x\": <0..1>, \"y\": <0..1>}, ...],\n\
         \x20 \"confidence\": <number 0..1, how sure you are of the count>\n\
         }\n\
         \n\
         \"locations\" lists the center of each counted item in normalized\n\
         image coordinates; it may be omitted. \"confidence\" may be omitted.\n",
    );

    prompt
}
