// Chart downsampling and axis label selection

/// Points to plot and, per plotted point, whether it carries an axis label.
#[derive(Debug, Clone, PartialEq)]
pub struct Downsampled<T> {
    pub points: Vec<T>,
    pub label_mask: Vec<bool>,
}

impl<T> Downsampled<T> {
    /// Render labels with `format`; unlabeled positions become "" so the
    /// label vector stays aligned with the points.
    pub fn labels<F>(&self, format: F) -> Vec<String>
    where
        F: Fn(&T) -> String,
    {
        self.points
            .iter()
            .zip(&self.label_mask)
            .map(|(point, labeled)| if *labeled { format(point) } else { String::new() })
            .collect()
    }
}

/// Keep every `ceil(len / max_points)`-th point, always including the last.
/// The result has at most `max_points + 1` points, and at least two when the
/// input has two or more.
pub fn downsample<T: Clone>(points: &[T], max_points: usize, max_labels: usize) -> Downsampled<T> {
    let max_points = max_points.max(1);

    let points: Vec<T> = if points.len() <= max_points {
        points.to_vec()
    } else {
        let step = points.len().div_ceil(max_points);
        let last = points.len() - 1;
        let mut selected: Vec<T> = points.iter().step_by(step).cloned().collect();
        if last % step != 0 {
            selected.push(points[last].clone());
        }
        selected
    };

    let label_mask = label_mask(points.len(), max_labels);
    Downsampled { points, label_mask }
}

/// First and last positions are always labeled, with up to `max_labels - 2`
/// evenly spaced interior positions between them.
pub fn label_mask(len: usize, max_labels: usize) -> Vec<bool> {
    if len <= max_labels {
        return vec![true; len];
    }

    let mut mask = vec![false; len];
    match max_labels {
        0 => return mask,
        1 => {
            mask[0] = true;
            return mask;
        }
        _ => {}
    }

    let stride = (len / (max_labels - 1)).max(1);
    mask[0] = true;
    let mut labeled = 1;
    for i in (stride..len - 1).step_by(stride) {
        if labeled >= max_labels - 1 {
            break;
        }
        mask[i] = true;
        labeled += 1;
    }
    mask[len - 1] = true;
    mask
}
