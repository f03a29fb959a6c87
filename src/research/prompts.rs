use crate::llm::Message;

use super::period;
use super::request::ResearchRequest;

pub const ANALYST_ROLE: &str = "あなたは食品・菓子業界の市場調査アナリスト。";

pub const REPORT_SCHEMA: &str = r#"{
  "id": "string",
  "generated_at": "ISO8601",
  "title": "string",
  "summary": "string",
  "trends": ["string"...],
  "implications": ["string"...],
  "risks": ["string"...],
  "next_actions": ["string"...],
  "credibility_score": number,
  "sources": [{"title":"string","publisher":"string","date":"string","url":"string","credibility":number,"notes":"string"}...]
}"#;

const USER_INSTRUCTIONS: &[&str] = &[
    "- 日本の小売/菓子文脈（百貨店、駅ナカ、CVS、EC、インバウンド）への示唆を必ず含める。",
    "- “いつ/誰が/何を/どこで/なぜ”の最低1要素を各トレンドに入れて、曖昧さを減らす。",
    "- 可能なら定量（%/価格/件数/市場規模など）を入れるが、数字は出典付きのみ。",
    "- 出典が弱い数字は“参考値”として扱い、risksに回す。",
];

const FORMAT_SYSTEM: &str = "あなたはデータ整形担当。\n\
出力はJSONのみ（前後に文章を付けない）。\n\
入力の調査ドラフトを、下記スキーマのJSONオブジェクトへ変換する。\n\
ルール:\n\
1) ドラフトの事実・数値・出典（URL・媒体名・日付）を落とさず、言い換えもしない。\n\
2) ドラフトにない情報を追加しない。該当がない項目は空文字または空配列にする。\n\
3) trends は5〜8件を目安に、ドラフトの記述順を保つ。";

const REPAIR_SYSTEM: &str = "あなたはJSON修復担当。\n\
出力はJSONオブジェクトのみ（前後に文章やコードブロックを付けない）。\n\
入力テキストは壊れている、または余計な文章を含むJSONである。\n\
内容を変えずに、下記スキーマに厳密に従う有効なJSONへ直す。\n\
読み取れない項目は空文字または空配列にする。";

/// Role-tagged instruction pair for one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    pub system: String,
    pub user: String,
}

impl Directives {
    pub fn messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// Research directives for a request.
///
/// With `retrieval` the model is told to search and write a free-form draft;
/// without it, the same call must answer directly as JSON. Search and JSON
/// output are never requested together.
pub fn research_directives(request: &ResearchRequest, retrieval: bool) -> Directives {
    let passes = request.settings.factcheck_level().passes();
    let threshold = request.settings.credibility_threshold();

    Directives {
        system: system_directive(passes, threshold, retrieval),
        user: user_directive(request),
    }
}

fn system_directive(passes: u32, threshold: u8, retrieval: bool) -> String {
    let (output_rule, purpose) = if retrieval {
        (
            "出力は調査ドラフト（自由記述）。後段でJSONに整形するため、下記スキーマの各項目に当たる内容を漏れなく書く。",
            "目的: 入力トピックについて、最新の公開情報を web_search で調査し、意思決定に使えるインサイトを作る。",
        )
    } else {
        (
            "出力はJSONのみ（前後に文章を付けない）。",
            "目的: 入力トピックについて、把握している公開情報をもとに、意思決定に使えるインサイトを作る。",
        )
    };

    [
        ANALYST_ROLE.to_string(),
        "出力は必ず日本語。".to_string(),
        output_rule.to_string(),
        purpose.to_string(),
        "ルール:".to_string(),
        "1) 参照ソースは必ずURL・媒体名・日付（可能なら公開日）を入れる。".to_string(),
        "2) 断定は根拠がある場合のみ。推測は推測と明示。".to_string(),
        "3) 最低でも主要ソースを5件は探す。難しい場合はその理由をrisksに書く。".to_string(),
        format!(
            "4) 各ソースと全体の信頼性スコア(1-5)を算出。{t}未満のソースも除外せずnotesに注意点を書き、{t}未満が多い場合はrisksで注意喚起。",
            t = threshold
        ),
        format!(
            "5) セルフファクトチェックを {} 回行い、矛盾・日付・固有名詞・引用整合性を点検してから出力。",
            passes
        ),
        "6) 過度な一般論で水増ししない。実務に落ちる提案に寄せる。".to_string(),
        String::new(),
        "出力JSONスキーマ:".to_string(),
        REPORT_SCHEMA.to_string(),
    ]
    .join("\n")
}

fn user_directive(request: &ResearchRequest) -> String {
    let query = period::normalize(request.period.as_ref());

    let mut lines = vec![
        format!("調査トピック: {}", request.topic()),
        format!("調査期間: {}", query.label),
        format!("業界: {}", join_tags(&request.industries)),
        format!("チャネル: {}", join_tags(&request.channels)),
        format!("実行モード: {}", request.mode),
        String::new(),
        "指示:".to_string(),
        format!(
            "- {}公開情報を中心に調査し、国内外（特に日本・米国・アジア）も必要に応じて触れる。",
            query.note
        ),
    ];
    lines.extend(USER_INSTRUCTIONS.iter().map(|s| s.to_string()));
    lines.join("\n")
}

fn join_tags(tags: &[String]) -> String {
    let joined = tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}

/// Format phase: transcode a research draft into the schema, losslessly.
pub fn format_directives(draft: &str) -> Directives {
    Directives {
        system: format!("{}\n\n出力JSONスキーマ:\n{}", FORMAT_SYSTEM, REPORT_SCHEMA),
        user: format!("調査ドラフト:\n{}", draft),
    }
}

/// Repair phase: coerce near-JSON into schema-valid JSON.
pub fn repair_directives(raw: &str, limit: usize) -> Directives {
    let total = raw.chars().count();
    let body = if total > limit {
        let head: String = raw.chars().take(limit).collect();
        format!("{}\n[truncated, {} total chars]", head, total)
    } else {
        raw.to_string()
    };

    Directives {
        system: format!("{}\n\n出力JSONスキーマ:\n{}", REPAIR_SYSTEM, REPORT_SCHEMA),
        user: format!("修復対象テキスト:\n{}", body),
    }
}
