use serde::{Deserialize, Serialize};

/// Body keypoints reported by the pose detector (33 in total)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LandmarkKind {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    LeftMouth = 9,
    RightMouth = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkKind {
    pub const COUNT: usize = 33;

    pub const ALL: [LandmarkKind; Self::COUNT] = [
        LandmarkKind::Nose,
        LandmarkKind::LeftEyeInner,
        LandmarkKind::LeftEye,
        LandmarkKind::LeftEyeOuter,
        LandmarkKind::RightEyeInner,
        LandmarkKind::RightEye,
        LandmarkKind::RightEyeOuter,
        LandmarkKind::LeftEar,
        LandmarkKind::RightEar,
        LandmarkKind::LeftMouth,
        LandmarkKind::RightMouth,
        LandmarkKind::LeftShoulder,
        LandmarkKind::RightShoulder,
        LandmarkKind::LeftElbow,
        LandmarkKind::RightElbow,
        LandmarkKind::LeftWrist,
        LandmarkKind::RightWrist,
        LandmarkKind::LeftPinky,
        LandmarkKind::RightPinky,
        LandmarkKind::LeftIndex,
        LandmarkKind::RightIndex,
        LandmarkKind::LeftThumb,
        LandmarkKind::RightThumb,
        LandmarkKind::LeftHip,
        LandmarkKind::RightHip,
        LandmarkKind::LeftKnee,
        LandmarkKind::RightKnee,
        LandmarkKind::LeftAnkle,
        LandmarkKind::RightAnkle,
        LandmarkKind::LeftHeel,
        LandmarkKind::RightHeel,
        LandmarkKind::LeftFootIndex,
        LandmarkKind::RightFootIndex,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Position in source-image pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A single detected body keypoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub kind: LandmarkKind,
    pub position: Point,
    /// Likelihood that the point is inside the frame
    pub confidence: f32,
}

impl Landmark {
    pub fn new(kind: LandmarkKind, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            kind,
            position: Point::new(x, y),
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
        }
    }
}

/// Landmarks detected in one frame; an absent kind means the point is not visible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
    slots: [Option<usize>; LandmarkKind::COUNT],
}

impl Default for LandmarkSet {
    fn default() -> Self {
        Self {
            landmarks: Vec::new(),
            slots: [None; LandmarkKind::COUNT],
        }
    }
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a landmark, replacing any earlier one of the same kind
    pub fn insert(&mut self, landmark: Landmark) {
        let slot = landmark.kind.index();
        match self.slots[slot] {
            Some(existing) => self.landmarks[existing] = landmark,
            None => {
                self.slots[slot] = Some(self.landmarks.len());
                self.landmarks.push(landmark);
            }
        }
    }

    pub fn get(&self, kind: LandmarkKind) -> Option<&Landmark> {
        self.slots[kind.index()].map(|i| &self.landmarks[i])
    }

    pub fn contains(&self, kind: LandmarkKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Landmarks in detection order
    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

impl From<Vec<Landmark>> for LandmarkSet {
    fn from(landmarks: Vec<Landmark>) -> Self {
        landmarks.into_iter().collect()
    }
}

impl From<LandmarkSet> for Vec<Landmark> {
    fn from(set: LandmarkSet) -> Self {
        set.landmarks
    }
}

impl FromIterator<Landmark> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        let mut set = LandmarkSet::new();
        for landmark in iter {
            set.insert(landmark);
        }
        set
    }
}
