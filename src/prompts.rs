//! Prompt construction for SQL generation.
//!
//! The schema description and the date rules are fixed; only the question
//! and the current date change between calls.

use chrono::NaiveDate;

pub const SYSTEM_PROMPT: &str = "Ты — опытный SQL-разработчик PostgreSQL. \
Ты пишешь ровно один запрос SELECT к известной схеме и возвращаешь только SQL-код.";

pub const SCHEMA_DESCRIPTION: &str = r#"СХЕМА БАЗЫ ДАННЫХ:
1. ТАБЛИЦА videos (одна строка на видео):
- id (UUID) - идентификатор видео
- creator_id (VARCHAR) - идентификатор креатора (пример: 'aca1061a9d324ecf8c3fa2bb32d7be63')
- video_created_at (TIMESTAMPTZ) - дата и время публикации видео
- views_count (BIGINT) - финальное количество просмотров
- likes_count (BIGINT) - финальное количество лайков
- comments_count (BIGINT) - финальное количество комментариев
- reports_count (BIGINT) - финальное количество жалоб
- created_at (TIMESTAMPTZ)
- updated_at (TIMESTAMPTZ)

2. ТАБЛИЦА video_snapshots (почасовые замеры, много строк на видео):
- id (VARCHAR) - идентификатор снапшота
- video_id (UUID) - ссылка на videos.id
- views_count (BIGINT) - текущее количество просмотров
- likes_count (BIGINT) - текущее количество лайков
- comments_count (BIGINT) - текущее количество комментариев
- reports_count (BIGINT) - текущее количество жалоб
- delta_views_count (BIGINT) - приращение просмотров с прошлого замера (может быть отрицательным)
- delta_likes_count (BIGINT) - приращение лайков с прошлого замера
- delta_comments_count (BIGINT) - приращение комментариев с прошлого замера
- delta_reports_count (BIGINT) - приращение жалоб с прошлого замера
- created_at (TIMESTAMPTZ) - время замера (раз в час)
- updated_at (TIMESTAMPTZ)"#;

pub const TIMEZONE_RULES: &str = r#"ВАЖНО:
1. Все даты и время в БД хранятся в UTC (+00:00). Не полагайся на часовой пояс сессии.
2. Для фильтрации по дате видео используй CAST(video_created_at AT TIME ZONE 'UTC' AS DATE)
3. Для фильтрации по дате снапшотов используй CAST(created_at AT TIME ZONE 'UTC' AS DATE)
4. Для фильтрации по точному времени внутри дня указывай часовой пояс UTC (+00):
- created_at >= '2025-11-28 10:00:00+00'
- created_at < '2025-11-28 15:00:00+00'
5. Для фильтрации по периоду дат используй диапазон с UTC:
- video_created_at >= '2025-11-01 00:00:00+00'
- video_created_at < '2025-11-06 00:00:00+00'
6. Всегда используй '<' вместо '<=' для верхней границы интервала.
7. В таблице video_snapshots НЕТ поля creator_id. Для фильтрации снапшотов по креатору используй JOIN с таблицей videos.
8. Относительные даты ("сегодня", "вчера", "за последние N дней") считай от текущей даты: {today}.
9. Верни ровно один запрос SELECT, возвращающий одно значение. Без комментариев и пояснений."#;

pub const DATE_EXAMPLES: &str = r#"ДАТЫ в русском формате конвертируй в SQL-формат:
- "28 ноября 2025" -> CAST(column AT TIME ZONE 'UTC' AS DATE) = '2025-11-28'
- "с 3 по 10 ноября 2025 включительно" -> column >= '2025-11-03 00:00:00+00' AND column < '2025-11-11 00:00:00+00'
- "с 7:00 до 11:00 25 ноября 2025" -> column >= '2025-11-25 07:00:00+00' AND column < '2025-11-25 11:00:00+00'
- "вчера" -> CAST(column AT TIME ZONE 'UTC' AS DATE) = DATE '{today}' - 1
- "за последние 7 дней" -> column >= DATE '{today}' - 6 AND column < DATE '{today}' + 1"#;

/// One question, with everything the model needs to answer it.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub question: String,
    pub today: NaiveDate,
}

impl TranslationRequest {
    pub fn new(question: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            question: question.into(),
            today,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    /// The user message: schema, rules, worked examples and the verbatim question.
    pub fn user_prompt(&self) -> String {
        let today = self.today.format("%Y-%m-%d").to_string();
        format!(
            "{}\n\n{}\n\n{}\n\nВОПРОС ПОЛЬЗОВАТЕЛЯ: {}\n\nSQL-ЗАПРОС (ТОЛЬКО КОД):",
            SCHEMA_DESCRIPTION,
            TIMEZONE_RULES.replace("{today}", &today),
            DATE_EXAMPLES.replace("{today}", &today),
            self.question
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(question: &str) -> TranslationRequest {
        TranslationRequest::new(question, NaiveDate::from_ymd_opt(2025, 12, 2).unwrap())
    }

    #[test]
    fn test_user_prompt_contains_question_verbatim() {
        let prompt = request("Сколько видео вышло 28 ноября 2025?").user_prompt();
        assert!(prompt.contains("ВОПРОС ПОЛЬЗОВАТЕЛЯ: Сколько видео вышло 28 ноября 2025?"));
        assert!(prompt.ends_with("SQL-ЗАПРОС (ТОЛЬКО КОД):"));
    }

    #[test]
    fn test_user_prompt_describes_both_tables() {
        let prompt = request("x").user_prompt();
        assert!(prompt.contains("ТАБЛИЦА videos"));
        assert!(prompt.contains("ТАБЛИЦА video_snapshots"));
        assert!(prompt.contains("delta_views_count"));
    }

    #[test]
    fn test_user_prompt_embeds_current_date() {
        let prompt = request("Сколько видео вышло вчера?").user_prompt();
        assert!(prompt.contains("от текущей даты: 2025-12-02"));
        assert!(prompt.contains("DATE '2025-12-02' - 1"));
        assert!(!prompt.contains("{today}"));
    }

    #[test]
    fn test_rules_forbid_inclusive_upper_bound() {
        let prompt = request("x").user_prompt();
        assert!(prompt.contains("'<' вместо '<='"));
        assert!(prompt.contains("AT TIME ZONE 'UTC' AS DATE"));
    }
}
