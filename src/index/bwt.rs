/// 由文本与后缀数组导出 BWT：bwt[w] = text[sa[w] - 1]（回绕取末位）。
pub fn build_bwt(text: &[u8], sa: &[u32]) -> Vec<u8> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    sa.iter()
        .map(|&p| {
            let i = p as usize;
            if i == 0 { text[n - 1] } else { text[i - 1] }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::sa::build_sa;

    #[test]
    fn bwt_of_known_text() {
        // "banana" 的 DNA 版：ACGCGC + $
        let text = [1u8, 2, 3, 2, 3, 2, 0];
        let sa = build_sa(&text);
        let bwt = build_bwt(&text, &sa);
        assert_eq!(bwt.len(), text.len());
        // BWT 是文本的一个置换（含哨兵）
        let mut sorted_bwt = bwt.clone();
        let mut sorted_text = text.to_vec();
        sorted_bwt.sort_unstable();
        sorted_text.sort_unstable();
        assert_eq!(sorted_bwt, sorted_text);
        // 哨兵行的前驱是文本末位前一个字符
        assert_eq!(bwt[0], text[text.len() - 2]);
    }
}
