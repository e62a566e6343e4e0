//! Shared UI icons and emojis.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static PAUSE: Emoji<'_, '_> = Emoji("⏸️  ", "[||]");
pub static TRASH: Emoji<'_, '_> = Emoji("🗑️  ", "[DEL]");

// Record fields
pub static QUESTION: Emoji<'_, '_> = Emoji("❓ ", "Q:");
pub static DATABASE: Emoji<'_, '_> = Emoji("🗄️  ", "DB:");
pub static TABLE: Emoji<'_, '_> = Emoji("📊 ", "=>");
pub static ANSWER: Emoji<'_, '_> = Emoji("💬 ", "A:");
