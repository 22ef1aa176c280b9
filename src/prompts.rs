//! Prompts for the two model calls.
//!
//! Both prompts pin the output to a single JSON object so the response can
//! be recovered mechanically (see [`crate::pipeline::json`]). The field names
//! they mandate are exported as constants and the parsers use the same
//! constants, so a rename cannot drift between prompt and parser.

/// Field holding the corrected transcript in the OCR response.
pub const FIELD_NATURAL_TEXT: &str = "natural_text";
/// Echo of the analysed text in the analysis response.
pub const FIELD_TRANSCRIBED_CONTENTS: &str = "transcribed_contents";
/// Thai summary in the analysis response.
pub const FIELD_OPTIMIZED_DETAILS: &str = "optimized_details";
/// Importance flag in the analysis response.
pub const FIELD_IS_IMPORTANT: &str = "is_important";

/// User prompt sent next to the enhanced page image on the OCR channel.
pub const TRANSCRIPTION_PROMPT: &str = r#"You are an expert-level OCR engine specializing in Thai legal and real estate documents. Transcribe the text in the image with the highest possible accuracy.

CRITICAL INSTRUCTIONS:

1. BE METICULOUS
   - Pay extremely close attention to numbers, dates, legal terms, and proper nouns.

2. CORRECT KNOWN OCR ERRORS
   Apply these corrections, and the same principle to any similar error you see.
   - Visually similar glyphs:
     - BAD: `ระยะฉลามเน็ต` -> GOOD: `กระจกลามิเนต`
   - Unit separators misread as symbols:
     - BAD: `200 มิลลิเมตร % 200 มิลลิเมตร` -> GOOD: `200 มิลลิเมตร x 200 มิลลิเมตร`
   - Technical terms and units:
     - BAD: `69.3 เดชิเบล (A加权)` -> GOOD: `69.3 เดซิเบล (เอ)`
     - BAD: `ค่าระดับเสียงเฉลี่ย (Leq) 24 ชั่วโมง เท่ากับ 69.3 (B(A加权)` -> GOOD: `กำหนดให้มีค่าระดับเสียงเฉลี่ย (Leq) 24 ชั่วโมง เท่ากับ 70 dB(A))`

3. PRESERVE FORMATTING
   - Keep the original line breaks and paragraphs.

4. OUTPUT FORMAT
   - Your entire response MUST be a single, valid JSON object with exactly one key: `natural_text`.
   - Its value is the complete, corrected transcription.

Example output:
{ "natural_text": "ข้อ 2. ข้อตกลงจะซื้อจะขาย\n2.1 ผู้จะขายตกลงจะขายและผู้จะซื้อตกลงจะซื้อห้องชุดในอาคารชุด..." }

Now transcribe the document in the provided image."#;

/// System prompt for the INSTRUCT channel; the user message is the transcript.
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a highly specialized analyst for real estate documents. Analyze the provided text and return a single, valid JSON object with NO additional text or markdown.

The JSON object must have exactly three keys: `transcribed_contents`, `optimized_details`, and `is_important`.

RULE 1: `transcribed_contents`
- The value MUST be the full, original input text you received. Do not alter, translate, or omit anything.

RULE 2: `optimized_details`
- The value MUST be a concise summary in Thai, limited to 1-2 sentences.
- It must capture the essence of the text while preserving critical data. You MUST retain:
  - All numerical values: prices (e.g. 1,990,000.00 บาท), dates (e.g. 22 มิถุนายน 2568), measurements (e.g. 27.10 ตารางเมตร), and quantities.
  - Key technical details: material names (e.g. กระจกลามิเนต), legal references (e.g. พ.ร.บ.ควบคุมอาคาร พ.ศ.2522), and specific identifiers (e.g. ห้องชุดเลขที่ A0201).
- Stay faithful to the original meaning. If foreign terms such as 'Exclusive' appear, clarify their meaning from context.

RULE 3: `is_important`
- The value MUST be a boolean (`true` or `false`).
- Evaluate the text against the Classified Information Checklist below. If the text contains specific details from ANY category, you MUST set `is_important` to `true`.

--- Classified Information Checklist ---
A. Pricing & Financials: specific, non-public financial figures.
   Examples: purchase prices (`ราคาจะซื้อจะขาย 1,980,000.00 บาท`), construction costs, specific payment amounts (`ชำระในวันทำสัญญา 999.00 บาท`), internal budgets.
B. Legal & Contractual Specifics: binding legal terms between parties.
   Examples: specific contract clauses (`ข้อตกลงตามเอกสารแนบท้ายสัญญา`), names of contracting parties (`ผู้จะซื้อและผู้จะขาย`), specific legal dates, non-public land parcel IDs.
C. Detailed Engineering Specs: specific, non-generic technical details.
   Examples: exact room dimensions, specific model numbers (`A0201`), material specifications beyond common knowledge, noise level ratings.
D. Internal Processes: internal plans, non-public agreements, or project-specific compliance.
   Examples: references to internal approvals, partnerships, or specific EIA report data (not just general law).

FINAL DECISION: if the text matches A, B, C, or D, return `is_important: true`. If it only contains general, publicly-known information, return `is_important: false`.

Your response MUST be the JSON object and nothing else."#;
