//! Dictionary for memorable disk-encryption passphrases.
//!
//! Lowercase ASCII words of 4 to 8 letters, easy to type at an early-boot
//! unlock prompt with an unfamiliar keymap.

pub(super) const WORDLIST: &[&str] = &[
    "able", "acid", "aged", "also", "apex", "arch", "area", "army", "atom", "aunt", "away", "axis",
    "baby", "back", "bake", "ball", "band", "bank", "barn", "base", "bath", "beam", "bean", "bear",
    "beef", "bell", "belt", "bench", "berry", "bike", "bird", "black", "blade", "blank", "blast",
    "blaze", "blend", "block", "bloom", "blue", "board", "boat", "bold", "bolt", "bone", "book",
    "boot", "boss", "bowl", "brain", "brave", "bread", "brick", "bride", "brief", "bring", "broad",
    "brook", "brown", "brush", "build", "bulk", "bunch", "cabin", "cable", "cake", "calm", "camel",
    "camp", "candle", "canoe", "canvas", "cargo", "carpet", "carry", "castle", "cave", "cedar",
    "chair", "chalk", "charm", "chase", "cheek", "cherry", "chess", "chief", "child", "chimney",
    "cider", "circle", "civic", "clay", "clerk", "cliff", "climb", "clock", "cloud", "clover",
    "coach", "coast", "cobra", "cocoa", "coin", "comet", "coral", "cotton", "couch", "crane",
    "crate", "cream", "creek", "crisp", "crow", "crown", "cube", "curve", "cycle", "daisy",
    "dance", "dawn", "delta", "denim", "desert", "diary", "dock", "dolphin", "donkey", "door",
    "dove", "dragon", "drama", "dream", "drift", "drum", "duck", "dune", "eagle", "earth", "easel",
    "echo", "elbow", "elder", "ember", "empire", "engine", "equal", "event", "fabric", "falcon",
    "fancy", "farm", "feast", "fence", "fern", "ferry", "fever", "fiber", "field", "finch",
    "flame", "flask", "fleet", "flint", "flour", "flute", "focus", "forest", "forge", "fossil",
    "foxglove", "frame", "frost", "fruit", "galaxy", "garden", "garlic", "gate", "gecko",
    "gemstone", "giant", "ginger", "glacier", "glass", "globe", "glove", "goat", "gold", "goose",
    "grain", "grape", "grass", "gravel", "green", "grove", "guitar", "habit", "harbor", "harp",
    "hawk", "hazel", "heart", "hedge", "helmet", "heron", "hill", "honey", "horizon", "horse",
    "hotel", "house", "iceberg", "igloo", "image", "index", "iris", "island", "ivory", "jacket",
    "jaguar", "jelly", "jewel", "jungle", "juror", "kayak", "kernel", "kettle", "kiwi", "knight",
    "koala", "label", "ladder", "lagoon", "lake", "lamp", "lantern", "laser", "lava", "lemon",
    "level", "lily", "linen", "lion", "lizard", "lobster", "locket", "lotus", "lunar", "magnet",
    "mango", "maple", "marble", "market", "meadow", "melon", "mercury", "metal", "meteor", "mint",
    "mirror", "moon", "mosaic", "moss", "motor", "mountain", "mouse", "muffin", "museum", "nectar",
    "needle", "nest", "noble", "north", "novel", "oasis", "ocean", "olive", "onion", "opal",
    "orange", "orbit", "orchid", "otter", "owlet", "oyster", "paddle", "palace", "panda", "paper",
    "parrot", "pastel", "pearl", "pebble", "pepper", "piano", "pilot", "pine", "planet", "plaza",
    "plum", "polar", "pond", "poppy", "portal", "prism", "pumpkin", "puzzle", "quartz", "quest",
    "quill", "rabbit", "radar", "rain", "raven", "reef", "ribbon", "river", "robin", "rocket",
    "rose", "ruby", "saddle", "sailor", "salmon", "sand", "satin", "scarf", "school", "shadow",
    "shell", "shore", "silver", "sketch", "slate", "sonnet", "spark", "spice", "spider", "spruce",
    "squid", "stable", "star", "steam", "stone", "storm", "stream", "sugar", "summit", "sunset",
    "swan", "table", "tango", "tiger", "timber", "toast", "topaz", "tower", "trail", "tulip",
    "tundra", "turtle", "umbrella", "valley", "velvet", "violet", "walnut", "walrus", "water",
    "whale", "willow", "window", "winter", "wizard", "wolf", "yacht", "yellow", "zebra", "zenith",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_words_are_lowercase_ascii() {
        for word in WORDLIST {
            assert!((4..=8).contains(&word.len()), "{word}");
            assert!(word.bytes().all(|b| b.is_ascii_lowercase()), "{word}");
        }
    }

    #[test]
    fn test_words_are_unique() {
        let unique: HashSet<_> = WORDLIST.iter().collect();
        assert_eq!(unique.len(), WORDLIST.len());
        assert!(WORDLIST.len() >= 256);
    }
}
