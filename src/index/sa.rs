/// 构建后缀数组（倍增法，每轮按 (rank, rank+k) 对排序）。
/// 输入为数值化文本（0:$,1:A,2:C,3:G,4:T），末尾应带哨兵 0。
pub fn build_sa(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }

    let mut sa: Vec<u32> = (0..n as u32).collect();
    let mut rank: Vec<u32> = text.iter().map(|&b| u32::from(b)).collect();
    let mut next_rank: Vec<u32> = vec![0; n];

    let key = |rank: &[u32], i: usize, k: usize| -> (u32, u32) {
        let second = if i + k < n { rank[i + k] + 1 } else { 0 };
        (rank[i], second)
    };

    let mut k = 1usize;
    loop {
        sa.sort_unstable_by_key(|&i| key(&rank, i as usize, k));

        next_rank[sa[0] as usize] = 0;
        for w in 1..n {
            let prev = sa[w - 1] as usize;
            let curr = sa[w] as usize;
            let bump = u32::from(key(&rank, prev, k) != key(&rank, curr, k));
            next_rank[curr] = next_rank[prev] + bump;
        }
        rank.copy_from_slice(&next_rank);

        if rank[sa[n - 1] as usize] as usize == n - 1 || k >= n {
            break;
        }
        k <<= 1;
    }

    sa
}
