// libpinyin/src/parser.rs
//
// ASCII syllable segmentation for the on-screen input buffer.
// - every way of splitting the buffer into syllables, best first
// - syllables are complete ("bei"), abbreviated ("b", "zh"),
//   incomplete ("be") or invalid
// - an unparseable tail becomes one invalid syllable

use std::collections::HashMap;
use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Longest syllable the parser tries to match.
pub const SYLLABLE_MAX_LENGTH: usize = 6;

/// Consonants that may stand alone as an abbreviated syllable.
static CONSONANTS: phf::Set<&'static str> = phf::phf_set! {
    "b", "p", "m", "f", "d", "t", "n", "l", "g", "k", "h", "j", "q", "x",
    "zh", "ch", "sh", "r", "z", "c", "s", "y", "w",
};

/// Valid pinyin syllables, without tones.
static SYLLABLES: phf::Set<&'static str> = phf::phf_set! {
    "a", "o", "e",
    "ai", "ei", "ao", "ou", "er", "an", "en", "ang", "eng",
    "ba", "bai", "ban", "bang", "bao", "bei", "ben", "beng", "bi", "bian",
    "biao", "bie", "bin", "bing", "bo", "bu",
    "pa", "pai", "pan", "pang", "pao", "pei", "pen", "peng", "pi", "pian",
    "piao", "pie", "pin", "ping", "po", "pou", "pu",
    "ma", "mai", "man", "mang", "mao", "me", "mei", "men", "meng", "mi", "mian",
    "miao", "mie", "min", "ming", "miu", "mo", "mou", "mu",
    "fa", "fan", "fang", "fei", "fen", "feng", "fo", "fou", "fu",
    "da", "dai", "dan", "dang", "dao", "de", "dei", "deng", "di", "dian",
    "diao", "die", "ding", "diu", "dong", "dou", "du", "duan", "dui", "dun",
    "duo",
    "ta", "tai", "tan", "tang", "tao", "te", "teng", "ti", "tian", "tiao",
    "tie", "ting", "tong", "tou", "tu", "tuan", "tui", "tun", "tuo",
    "na", "nai", "nan", "nang", "nao", "ne", "nei", "nen", "neng", "ni", "nian",
    "niang", "niao", "nie", "nin", "ning", "niu", "nong", "nou", "nu", "nv",
    "nuan", "nve", "nuo",
    "la", "lai", "lan", "lang", "lao", "le", "lei", "leng", "li", "lia",
    "lian", "liang", "liao", "lie", "lin", "ling", "liu", "long", "lou",
    "lu", "lv", "luan", "lve", "lun", "luo",
    "ga", "gai", "gan", "gang", "gao", "ge", "gei", "gen", "geng", "gong",
    "gou", "gu", "gua", "guai", "guan", "guang", "gui", "gun", "guo",
    "ka", "kai", "kan", "kang", "kao", "ke", "ken", "keng", "kong", "kou",
    "ku", "kua", "kuai", "kuan", "kuang", "kui", "kun", "kuo",
    "ha", "hai", "han", "hang", "hao", "he", "hei", "hen", "heng", "hong",
    "hou", "hu", "hua", "huai", "huan", "huang", "hui", "hun", "huo",
    "ji", "jia", "jian", "jiang", "jiao", "jie", "jin", "jing", "jiong",
    "jiu", "ju", "juan", "jue", "jun",
    "qi", "qia", "qian", "qiang", "qiao", "qie", "qin", "qing", "qiong", "qiu",
    "qu", "quan", "que", "qun",
    "xi", "xia", "xian", "xiang", "xiao", "xie", "xin", "xing", "xiong", "xiu",
    "xu", "xuan", "xue", "xun",
    "zhi", "zha", "zhai", "zhan", "zhang", "zhao", "zhe", "zhei", "zhen",
    "zheng", "zhong", "zhou", "zhu", "zhua", "zhuai", "zhuan", "zhuang", "zhui",
    "zhun", "zhuo",
    "chi", "cha", "chai", "chan", "chang", "chao", "che", "chen", "cheng",
    "chong", "chou", "chu", "chua", "chuai", "chuan", "chuang", "chui", "chun",
    "chuo",
    "shi", "sha", "shai", "shan", "shang", "shao", "she", "shei", "shen",
    "sheng", "shou", "shu", "shua", "shuai", "shuan", "shuang", "shui", "shun",
    "shuo",
    "ri", "ran", "rang", "rao", "re", "ren", "reng", "rong", "rou", "ru",
    "ruan", "rui", "run", "ruo",
    "zi", "za", "zai", "zan", "zang", "zao", "ze", "zei", "zen", "zeng",
    "zong", "zou", "zu", "zuan", "zui", "zun", "zuo",
    "ci", "ca", "cai", "can", "cang", "cao", "ce", "cen", "ceng", "cong",
    "cou", "cu", "cuan", "cui", "cun", "cuo",
    "si", "sa", "sai", "san", "sang", "sao", "se", "sen", "seng", "song",
    "sou", "su", "suan", "sui", "sun", "suo",
    "ya", "yan", "yang", "yao", "ye", "yi", "yin", "ying", "yong", "you",
    "yu", "yuan", "yue", "yun",
    "wa", "wai", "wan", "wang", "wei", "wen", "weng", "wo", "wu",
};

/// Proper prefixes of the syllables above ("zho" for "zhong").
static PARTIALS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut set = HashSet::new();
    for syllable in SYLLABLES.iter() {
        for end in 1..syllable.len() {
            set.insert(&syllable[..end]);
        }
    }
    set
});

/// How a piece of the input matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyllableKind {
    /// A whole syllable, such as "yue" or "bei".
    Complete,
    /// A lone initial consonant, such as "b" or "zh".
    Abbreviated,
    /// The beginning of a syllable that is neither of the above, such as "be".
    Incomplete,
    Invalid,
}

/// One piece of a segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syllable {
    pub text: String,
    pub kind: SyllableKind,
}

impl Syllable {
    pub fn new<T: Into<String>>(text: T, kind: SyllableKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// One way of dividing the input.
pub type Segment = Vec<Syllable>;

/// Pinyin buffer segmenter.
///
/// `parse` returns every segmentation, sorted so that those with fewer
/// abbreviated, incomplete or invalid syllables come first, then those with
/// fewer syllables. "fangan" gives both "fang'an" and "fan'gan".
#[derive(Debug, Clone, Default)]
pub struct PinyinParser;

impl PinyinParser {
    pub fn new() -> Self {
        Self
    }

    /// Classify a single piece of input.
    pub fn syllable_kind(&self, s: &str) -> SyllableKind {
        if CONSONANTS.contains(s) {
            SyllableKind::Abbreviated
        } else if SYLLABLES.contains(s) {
            SyllableKind::Complete
        } else if PARTIALS.contains(s) {
            SyllableKind::Incomplete
        } else {
            SyllableKind::Invalid
        }
    }

    /// Every segmentation of `input`, best first.
    ///
    /// Leading and trailing apostrophes are ignored; an input made only of
    /// apostrophes gives no segmentation. When the input cannot be parsed to
    /// the end, the longest parseable prefix is segmented and the rest is
    /// appended as one invalid syllable. Syllables are lowercase; capital
    /// letters are not folded and end the parseable part.
    pub fn parse(&self, input: &str) -> Vec<Segment> {
        let input = input.trim_matches('\'');
        if input.is_empty() {
            return Vec::new();
        }

        let mut memo = HashMap::new();
        let mut end = input.len();
        let mut results = Vec::new();
        while end > 0 {
            if input.is_char_boundary(end) {
                results = self.parse_internal(&input[..end], &mut memo);
                if !results.is_empty() {
                    break;
                }
            }
            end -= 1;
        }

        if end != input.len() {
            let invalid = vec![Syllable::new(&input[end..], SyllableKind::Invalid)];
            results = append_sub_segments(results, vec![invalid]);
        }
        results
    }

    /// Segmentations made of valid syllables only; empty when there is none.
    /// Results are memoized per remaining suffix.
    fn parse_internal<'a>(&self, input: &'a str, memo: &mut HashMap<&'a str, Vec<Segment>>) -> Vec<Segment> {
        let input = input.trim_matches('\'');
        if input.is_empty() {
            return Vec::new();
        }
        if let Some(done) = memo.get(input) {
            return done.clone();
        }

        let mut results: Vec<Segment> = Vec::new();
        let mut end = input.len().min(SYLLABLE_MAX_LENGTH);
        while end > 0 {
            if !input.is_char_boundary(end) {
                end -= 1;
                continue;
            }
            let key = &input[..end];
            let kind = self.syllable_kind(key);
            if kind != SyllableKind::Invalid {
                let mut sub_segments = Vec::new();
                if end < input.len() {
                    sub_segments = self.parse_internal(&input[end..], memo);
                }
                if end == input.len() || !sub_segments.is_empty() {
                    let head = vec![vec![Syllable::new(key, kind)]];
                    results.extend(append_sub_segments(head, sub_segments));
                }
            }
            end -= 1;
        }

        results.sort_by_key(|s| (incompleteness(s), s.len()));
        memo.insert(input, results.clone());
        results
    }
}

/// Cartesian product: each segment followed by each sub-segment.
fn append_sub_segments(segments: Vec<Segment>, sub_segments: Vec<Segment>) -> Vec<Segment> {
    if segments.is_empty() {
        return sub_segments;
    }
    if sub_segments.is_empty() {
        return segments;
    }
    let mut out = Vec::with_capacity(segments.len() * sub_segments.len());
    for segment in &segments {
        for sub in &sub_segments {
            let mut joined = segment.clone();
            joined.extend(sub.iter().cloned());
            out.push(joined);
        }
    }
    out
}

/// Ranking penalty of a segmentation; lower is better.
pub fn incompleteness(segment: &[Syllable]) -> usize {
    segment
        .iter()
        .map(|s| match s.kind {
            SyllableKind::Complete => 0,
            SyllableKind::Abbreviated => 2,
            SyllableKind::Incomplete => 1,
            SyllableKind::Invalid => 3 * s.text.len(),
        })
        .sum()
}
