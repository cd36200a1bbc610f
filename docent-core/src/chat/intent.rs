use std::fmt;

/// What a text-only question is asking for; decides how it is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    SpecificQuestion,
    GeneralQuestion,
    Thanks,
    OffTopic,
    Unknown,
}

impl Intent {
    /// Reads the classifier's reply.
    ///
    /// Only the first whitespace-delimited token counts, lower-cased with
    /// surrounding quotes and punctuation removed. Both the labels the
    /// classifier prompt asks for and their English names are accepted.
    pub fn from_label(reply: &str) -> Self {
        let token = reply.split_whitespace().next().unwrap_or_default().to_lowercase();
        let label = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');

        match label {
            "sapaan" | "greeting" => Intent::Greeting,
            "pertanyaan_spesifik" | "specific_question" => Intent::SpecificQuestion,
            "pertanyaan_umum" | "general_question" => Intent::GeneralQuestion,
            "terima_kasih" | "thanks" => Intent::Thanks,
            "tidak_relevan" | "off_topic" => Intent::OffTopic,
            _ => Intent::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Intent::Greeting => "sapaan",
            Intent::SpecificQuestion => "pertanyaan_spesifik",
            Intent::GeneralQuestion => "pertanyaan_umum",
            Intent::Thanks => "terima_kasih",
            Intent::OffTopic => "tidak_relevan",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(Intent::from_label("sapaan"), Intent::Greeting);
        assert_eq!(Intent::from_label("pertanyaan_spesifik"), Intent::SpecificQuestion);
        assert_eq!(Intent::from_label("pertanyaan_umum"), Intent::GeneralQuestion);
        assert_eq!(Intent::from_label("terima_kasih"), Intent::Thanks);
        assert_eq!(Intent::from_label("tidak_relevan"), Intent::OffTopic);
        assert_eq!(Intent::from_label("thanks"), Intent::Thanks);
    }

    #[test]
    fn test_verbose_replies() {
        assert_eq!(Intent::from_label("  Sapaan. Pengguna menyapa."), Intent::Greeting);
        assert_eq!(Intent::from_label("'pertanyaan_spesifik'\n"), Intent::SpecificQuestion);
        assert_eq!(Intent::from_label("**TIDAK_RELEVAN**"), Intent::OffTopic);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(Intent::from_label(""), Intent::Unknown);
        assert_eq!(Intent::from_label("Kategori: sapaan"), Intent::Unknown);
    }
}
