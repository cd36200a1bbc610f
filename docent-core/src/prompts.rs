//! Prompt templates sent to the completion service.

/// Single-label intent classification. The reply's first word is the label.
pub fn intent_prompt(question: &str) -> String {
    format!(
        "Klasifikasikan input pengguna berikut ke dalam salah satu kategori ini: \
         'sapaan', 'pertanyaan_spesifik', 'pertanyaan_umum', 'terima_kasih', 'tidak_relevan'. \
         Jawab HANYA dengan satu kata.\n\nInput Pengguna: {}\nOutput:",
        question
    )
}

/// Hypothetical-document expansion: an answer-shaped paragraph for retrieval.
pub fn hyde_prompt(question: &str) -> String {
    format!(
        "Tulis paragraf jawaban ideal untuk pertanyaan pengguna berikut. \
         Anggap ini ada di dokumen knowledge base. \
         Tulis langsung, tanpa pembukaan.\n\nPertanyaan: {}\nJawaban:",
        question
    )
}

/// Grounding rules for answers built from retrieved context.
pub const ANSWER_SYSTEM_PROMPT: &str = "Anda adalah asisten AI untuk sistem IOSS.
Jawaban Anda HARUS selalu berdasarkan teks yang diberikan pada bagian 'Konteks Dokumen'.
Pertimbangkan pertanyaan dan jawaban sebelumnya agar memahami konteks percakapan.
Jangan menebak atau menggunakan pengetahuan luar.

### ATURAN:
1. Jawab hanya dari 'Konteks Dokumen'. Jika tidak relevan, katakan:
   \"Maaf, saya tidak menemukan informasi tersebut dalam dokumen IOSS.\"
2. Jawaban ringkas, jelas, profesional. Gunakan format point bila perlu.
3. Jangan ulangi pertanyaan pengguna.
4. Jangan menambahkan detail yang tidak ada dalam konteks.
5. Bahasa Indonesia profesional, langsung ke inti, tanpa sapaan.";

/// Wraps retrieved context as the first user message of an answer prompt.
pub fn context_message(context: &str) -> String {
    format!("Gunakan hanya konteks berikut:\n\n{}", context)
}
